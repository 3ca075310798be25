use darling::{Error, FromDeriveInput as _};
use proc_macro2::TokenStream;
use syn::{Data, Fields};

use crate::args::TypeArgs;

pub fn entry_point(input: syn::DeriveInput) -> darling::Result<TokenStream> {
    let crate_ = TypeArgs::from_derive_input(&input)?.crate_path();

    let Data::Enum(data) = input.data else {
        let err = Error::custom("enumerations must be enums");
        return Err(err.with_span(&input.ident));
    };

    if !input.generics.params.is_empty() {
        let err = Error::custom("enumerations cannot be generic");
        return Err(err.with_span(&input.generics));
    }

    let mut acc = Error::accumulator();
    let mut idents = Vec::new();

    for variant in data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            let err = Error::custom("enumeration variants cannot have fields");
            acc.push(err.with_span(&variant));
            continue;
        }

        idents.push(variant.ident);
    }

    let enum_ident = &input.ident;

    let from_i32 = quote::quote! {
        fn from_i32(value: i32) -> #crate_::Result<#enum_ident> {
            #(
                if value == #enum_ident::#idents as i32 {
                    return ::std::result::Result::Ok(#enum_ident::#idents);
                }
            )*

            ::std::result::Result::Err(#crate_::Error::InvalidEnum(value))
        }
    };

    let to_i32 = quote::quote! {
        fn to_i32(value: &#enum_ident) -> i32 {
            match *value {
                #( #enum_ident::#idents => #enum_ident::#idents as i32, )*
            }
        }
    };

    let errors = acc.finish().err().map(|e| e.write_errors());
    Ok(quote::quote! {
        #[automatically_derived]
        impl #crate_::Value for #enum_ident {
            const KIND: #crate_::Kind = <i32 as #crate_::Value>::KIND;

            fn read_value<R: ::std::io::Read>(
                reader: &mut #crate_::WireReader<R>,
                header: #crate_::Header,
            ) -> #crate_::Result<Self> {
                #from_i32

                let value = <i32 as #crate_::Value>::read_value(reader, header)?;
                from_i32(value)
            }

            fn write_value<W: ::std::io::Write>(
                &self,
                ordinal: u32,
                writer: &mut #crate_::WireWriter<W>,
            ) -> #crate_::Result<()> {
                #to_i32

                <i32 as #crate_::Value>::write_value(&to_i32(self), ordinal, writer)
            }
        }

        #[automatically_derived]
        impl #crate_::Element for #enum_ident {
            const LIST_KIND: #crate_::Kind = <i32 as #crate_::Element>::LIST_KIND;

            fn read_list<R: ::std::io::Read>(
                reader: &mut #crate_::WireReader<R>,
                header: #crate_::Header,
            ) -> #crate_::Result<::std::vec::Vec<Self>> {
                #from_i32

                let values = <i32 as #crate_::Element>::read_list(reader, header)?;
                values.into_iter().map(from_i32).collect()
            }

            fn write_list<W: ::std::io::Write>(
                values: &[Self],
                ordinal: u32,
                writer: &mut #crate_::WireWriter<W>,
            ) -> #crate_::Result<()> {
                #to_i32

                let values: ::std::vec::Vec<i32> = values.iter().map(to_i32).collect();
                <i32 as #crate_::Element>::write_list(&values, ordinal, writer)
            }
        }

        #errors
    })
}
