use std::fmt;

use darling::ast::NestedMeta;
use darling::{Error, FromDeriveInput as _, FromMeta as _};
use proc_macro2::{Span, TokenStream};
use syn::{Data, Fields, GenericArgument, Ident, PathArguments, Type};

use crate::args::{FieldMeta, FieldWireMeta, TypeArgs};

pub fn entry_point(input: syn::DeriveInput) -> darling::Result<TokenStream> {
    let crate_ = TypeArgs::from_derive_input(&input)?.crate_path();

    let Data::Struct(data) = input.data else {
        let err = Error::custom("records must be structs with named fields");
        return Err(err.with_span(&input.ident));
    };

    let Fields::Named(fields) = data.fields else {
        let err = Error::custom("records must be structs with named fields");
        return Err(err.with_span(&input.ident));
    };

    let mut acc = Error::accumulator();

    let mut ordinals: Vec<u32> = Vec::new();
    let mut idents: Vec<Ident> = Vec::new();
    let mut tys: Vec<Type> = Vec::new();

    for field in fields.named {
        let Some(ident) = field.ident else {
            continue;
        };

        let attrs: Vec<_> = field
            .attrs
            .into_iter()
            .map(|attr| NestedMeta::Meta(attr.meta))
            .collect();

        let Some(meta) = acc.handle(FieldMeta::from_list(&attrs)) else {
            continue;
        };

        let args = FieldWireMeta::merge(meta.wire);
        if args.skip {
            if let Some(ordinal) = args.ordinal {
                acc.push(error_at(ordinal.span(), "skipped fields cannot have an ordinal"));
            }

            continue;
        }

        let Some(ordinal) = args.ordinal else {
            let err = Error::custom("fields need `#[wire(ordinal = N)]` or `#[wire(skip)]`");
            acc.push(err.with_span(&ident));
            continue;
        };

        if *ordinal == 0 {
            acc.push(error_at(ordinal.span(), "ordinals must be at least 1"));
            continue;
        }

        if let Some(index) = ordinals.iter().position(|o| *o == *ordinal) {
            let msg = format!("ordinal {} is already used by `{}`", *ordinal, idents[index]);
            acc.push(error_at(ordinal.span(), msg));
            continue;
        }

        let Some(ty) = option_inner(&field.ty) else {
            let err = Error::custom("record fields must be of type `Option<T>`");
            acc.push(err.with_span(&field.ty));
            continue;
        };

        ordinals.push(*ordinal);
        tys.push(ty.clone());
        idents.push(ident);
    }

    let ty_name = &input.ident;
    let (impl_gen, ty_gen, where_clause) = input.generics.split_for_impl();

    let errors = acc.finish().err().map(|e| e.write_errors());
    Ok(quote::quote! {
        #[automatically_derived]
        impl #impl_gen #crate_::Record for #ty_name #ty_gen #where_clause {
            fn read_field<R: ::std::io::Read>(
                &mut self,
                header: #crate_::Header,
                reader: &mut #crate_::WireReader<R>,
            ) -> #crate_::Result<()> {
                match header.ordinal() {
                    #(
                        #ordinals => {
                            if let ::std::option::Option::Some(value) = reader.read_or_skip::<#tys>()? {
                                self.#idents = ::std::option::Option::Some(value);
                            }
                        },
                    )*
                    _ => reader.skip()?,
                }

                ::std::result::Result::Ok(())
            }

            fn write_to<W: ::std::io::Write>(
                &self,
                writer: &mut #crate_::WireWriter<W>,
            ) -> #crate_::Result<()> {
                #(
                    if let ::std::option::Option::Some(value) = &self.#idents {
                        writer.write(#ordinals, value)?;
                    }
                )*

                ::std::result::Result::Ok(())
            }
        }

        #errors
    })
}

fn error_at(span: Span, msg: impl fmt::Display) -> Error {
    syn::Error::new(span, msg).into()
}

/// Gets `T` from a type written as `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };

    if path.qself.is_some() {
        return None;
    }

    let last = path.path.segments.last()?;
    if last.ident != "Option" {
        return None;
    }

    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };

    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}
