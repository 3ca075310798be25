#![expect(unused_crate_dependencies)]
use std::io;

use rand::prelude::*;
use wire_type::*;

/// Hands out one byte per read, like a slow socket.
struct Drip<'a> {
    data: &'a [u8],
    reads: usize,
}

impl io::Read for Drip<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        match (self.data.split_first(), buf.first_mut()) {
            (Some((&byte, rest)), Some(slot)) => {
                *slot = byte;
                self.data = rest;
                Ok(1)
            },
            _ => Ok(0),
        }
    }
}

#[derive(Debug, Default, PartialEq, Record)]
struct Leaf {
    #[wire(ordinal = 1)]
    text: Option<String>,
    #[wire(ordinal = 2)]
    value: Option<i64>,
    #[wire(ordinal = 3)]
    samples: Option<Vec<f64>>,
}

#[derive(Debug, Default, PartialEq, Record)]
struct Tree {
    #[wire(ordinal = 1)]
    leaves: Option<Vec<Leaf>>,
    #[wire(ordinal = 2)]
    blob: Option<Vec<u8>>,
    #[wire(ordinal = 300)]
    checksum: Option<u32>,
}

fn random_tree(rng: &mut StdRng, leaves: usize) -> Tree {
    let leaves = (0..leaves)
        .map(|i| Leaf {
            text: Some(format!("leaf #{i}")),
            value: Some(rng.random()),
            samples: Some((0..rng.random_range(0..20)).map(|_| rng.random()).collect()),
        })
        .collect();

    let mut blob = vec![0u8; rng.random_range(0..10_000)];
    rng.fill_bytes(&mut blob);

    Tree {
        leaves: Some(leaves),
        blob: Some(blob),
        checksum: Some(rng.random()),
    }
}

#[test]
fn byte_at_a_time() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let value = random_tree(&mut rng, 25);
    let buf = to_vec(&value).expect("vec write");

    let mut source = Drip {
        data: &buf,
        reads: 0,
    };

    let rev: Tree = WireReader::new(&mut source)
        .read_message()
        .expect("must decode");

    assert_eq!(rev, value, "must survive a slow source");
    assert!(source.reads > buf.len(), "each byte is its own read");
}

#[test]
fn small_buffer() {
    let mut rng = StdRng::seed_from_u64(0xB0FF);
    let value = random_tree(&mut rng, 50);
    let buf = to_vec(&value).expect("vec write");

    let rev: Tree = WireReader::with_capacity(buf.as_slice(), 16)
        .read_message()
        .expect("must decode");

    assert_eq!(rev, value, "must page through a minimal buffer");
}

#[test]
fn reader_stops_at_field() {
    // reading one field must not block on data past its end
    let mut buf = Vec::new();
    let mut writer = WireWriter::new(&mut buf);
    writer.write_u32(1, 7).expect("vec write");
    writer.write_string(2, "later").expect("vec write");

    let mut source = Drip {
        data: &buf,
        reads: 0,
    };

    let mut reader = WireReader::new(&mut source);
    assert_eq!(reader.read_u32().expect("first field"), 7, "first value");
    assert_eq!(reader.position(), 4, "first field and the next header");

    let source = reader.into_inner();
    assert_eq!(source.data, b"later", "next payload still unread");
}

#[test]
fn file_round_trip() {
    let mut rng = StdRng::seed_from_u64(0xF11E);
    let value = random_tree(&mut rng, 10);

    let mut file = io::Cursor::new(Vec::new());
    to_writer(io::BufWriter::new(&mut file), &value).expect("cursor write");

    file.set_position(0);
    let rev: Tree = from_reader(io::BufReader::new(file)).expect("must decode");
    assert_eq!(rev, value, "must round-trip");
}

#[test]
fn writer_counts_bytes() {
    let mut rng = StdRng::seed_from_u64(0xC0DE);
    let value = random_tree(&mut rng, 5);

    let mut writer = WireWriter::new(Vec::new());
    writer.write_message(&value).expect("vec write");
    assert_eq!(
        writer.total_written(),
        writer.into_inner().len() as u64,
        "counter matches output"
    );
}
