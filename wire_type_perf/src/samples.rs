//! Records used by the round trip.

use rand::prelude::*;
use wire_type::{Enumeration, Record};

pub const LEAF_TEXT: &str = "this is a string, persist me!";

#[derive(Debug, Clone, Copy, PartialEq, Enumeration)]
pub enum Choice {
    Foo = 1,
    Bar = 2,
    Baz = 3,
}

#[derive(Debug, Default, PartialEq, Record)]
pub struct Basic {
    #[wire(ordinal = 1)]
    pub text: Option<String>,
    #[wire(ordinal = 2)]
    pub value: Option<i32>,
    #[wire(ordinal = 3)]
    pub choice: Option<Choice>,
    #[wire(ordinal = 4)]
    pub values: Option<Vec<f32>>,
    #[wire(ordinal = 5)]
    pub list: Option<Vec<u64>>,
    #[wire(ordinal = 6)]
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Default, PartialEq, Record)]
pub struct Complex {
    #[wire(ordinal = 1)]
    pub leaves: Option<Vec<Basic>>,
    #[wire(ordinal = 4)]
    pub branches: Option<Vec<Complex>>,
}

#[derive(Debug, Default, PartialEq, Record)]
pub struct Person {
    #[wire(ordinal = 1)]
    pub name: Option<String>,
    /// Seconds since the unix epoch.
    #[wire(ordinal = 2)]
    pub born: Option<i64>,
    /// Seconds.
    #[wire(ordinal = 3)]
    pub lifespan: Option<i64>,
    #[wire(ordinal = 4)]
    pub mother: Option<Vec<Person>>,
    #[wire(ordinal = 7)]
    pub friends: Option<Vec<String>>,
    #[wire(ordinal = 8)]
    pub raw: Option<Vec<u8>>,
    #[wire(ordinal = 567)]
    pub images: Option<Vec<Vec<u8>>>,
}

/// Builds a leaf with `floats` random values.
pub fn basic(rng: &mut StdRng, index: i32, floats: u32) -> Basic {
    Basic {
        text: Some(LEAF_TEXT.to_owned()),
        value: Some(index),
        choice: Some(Choice::Baz),
        values: Some((0..floats).map(|_| rng.random()).collect()),
        list: None,
        choices: None,
    }
}

/// Builds a record with `leaves` leaves and one small branch.
pub fn complex(rng: &mut StdRng, leaves: u32, floats: u32) -> Complex {
    let mut index = 0i32;
    let mut next_leaf = |rng: &mut StdRng| {
        index = index.wrapping_add(1);
        basic(rng, index, floats)
    };

    let leaves = (0..leaves).map(|_| next_leaf(rng)).collect();

    let mut branch_leaf = next_leaf(rng);
    branch_leaf.list = Some((0..8).map(|_| rng.random()).collect());
    branch_leaf.choices = Some(vec![Choice::Foo, Choice::Bar, Choice::Baz]);

    Complex {
        leaves: Some(leaves),
        branches: Some(vec![Complex {
            leaves: Some(vec![branch_leaf]),
            branches: None,
        }]),
    }
}

/// Builds a person with two generations of ancestors.
pub fn person(rng: &mut StdRng) -> Person {
    let mut image = |len: usize| {
        let mut buf = vec![0u8; len];
        rng.fill_bytes(&mut buf);
        buf
    };

    let photos = vec![image(64), Vec::new(), image(1500)];
    let raw = image(32);

    let grandmother = Person {
        name: Some("Edith".to_owned()),
        born: Some(-1_262_304_000),
        lifespan: Some(2_871_676_800),
        ..Person::default()
    };

    let mother = Person {
        name: Some("Ruth".to_owned()),
        born: Some(-283_996_800),
        mother: Some(vec![grandmother]),
        friends: Some(Vec::new()),
        ..Person::default()
    };

    Person {
        name: Some("Ada".to_owned()),
        born: Some(230_515_200),
        lifespan: None,
        mother: Some(vec![mother]),
        friends: Some(vec!["Grace".to_owned(), "Barbara".to_owned(), String::new()]),
        raw: Some(raw),
        images: Some(photos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let value = complex(&mut rng, 10, 4);

        let leaves = value.leaves.as_ref().expect("leaves set");
        assert_eq!(leaves.len(), 10, "leaf count");
        assert!(
            leaves.iter().all(|l| l.values.as_ref().is_some_and(|v| v.len() == 4)),
            "float count"
        );
        assert_eq!(value.branches.as_ref().map(Vec::len), Some(1), "one branch");
    }

    #[test]
    fn round_trip_complex() {
        let mut rng = StdRng::seed_from_u64(2);
        let value = complex(&mut rng, 25, 32);

        let buf = wire_type::to_vec(&value).expect("vec write");
        let rev: Complex = wire_type::from_slice(&buf).expect("must decode");
        assert_eq!(rev, value, "must round-trip");
    }

    #[test]
    fn round_trip_person() {
        let mut rng = StdRng::seed_from_u64(3);
        let value = person(&mut rng);

        let buf = wire_type::to_vec(&value).expect("vec write");
        let rev: Person = wire_type::from_slice(&buf).expect("must decode");
        assert_eq!(rev, value, "must round-trip");
    }

    #[test]
    fn leaf_layout() {
        let leaf = Basic {
            text: Some("x".to_owned()),
            value: Some(1),
            choice: Some(Choice::Baz),
            ..Basic::default()
        };

        let buf = wire_type::to_vec(&leaf).expect("vec write");
        assert_eq!(buf, [0x41, 0x01, b'x', 0x02, 0x02, 0x03, 0x06], "exact layout");
    }
}
