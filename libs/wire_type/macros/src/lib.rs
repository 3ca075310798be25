//! Derive macros for the `wire_type` crate.

use proc_macro::TokenStream as StdTokenStream;
use syn::DeriveInput;

mod args;
mod derive_enumeration;
mod derive_record;

/// Derives `Record` for a struct with named fields.
///
/// Every field must either be an [`Option`] of a `Value` and be given an
/// ordinal, or be skipped:
///
/// - `#[wire(ordinal = N)]`: the field is written with ordinal `N` when it is
///   [`Some`] and read back from a field with that ordinal. Ordinals must be
///   at least 1 and unique within the struct.
/// - `#[wire(skip)]`: the field is left alone. Reading keeps its default.
///
/// Fields are written in declaration order. Fields with unknown ordinals or
/// an unexpected kind are skipped when reading.
///
/// The struct must also implement [`Default`].
///
/// Use `#[wire(crate = "path")]` on the struct if `wire_type` isn't available
/// as `::wire_type`.
#[proc_macro_derive(Record, attributes(wire))]
pub fn derive_record(input: StdTokenStream) -> StdTokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    derive_record::entry_point(input)
        .unwrap_or_else(|e| e.write_errors())
        .into()
}

/// Derives `Value` and `Element` for an enum with only unit variants.
///
/// The enum is written as the [`i32`] value of its discriminant and lists of
/// it as lists of [`i32`]. Values without a matching variant are read as
/// absent.
#[proc_macro_derive(Enumeration, attributes(wire))]
pub fn derive_enumeration(input: StdTokenStream) -> StdTokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    derive_enumeration::entry_point(input)
        .unwrap_or_else(|e| e.write_errors())
        .into()
}
