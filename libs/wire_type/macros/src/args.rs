use darling::util::SpannedValue;
use syn::Path;

#[derive(Debug, darling::FromDeriveInput)]
#[darling(attributes(wire))]
pub struct TypeArgs {
    #[darling(rename = "crate")]
    pub crate_: Option<Path>,
}

impl TypeArgs {
    pub fn crate_path(self) -> Path {
        self.crate_
            .unwrap_or_else(|| syn::parse_quote!(::wire_type))
    }
}

/// All attributes on a field. Only `wire` is of interest.
#[derive(Debug, darling::FromMeta)]
#[darling(allow_unknown_fields)]
pub struct FieldMeta {
    #[darling(multiple)]
    pub wire: Vec<FieldWireMeta>,
}

#[derive(Debug, Default, darling::FromMeta)]
pub struct FieldWireMeta {
    pub ordinal: Option<SpannedValue<u32>>,
    #[darling(default)]
    pub skip: bool,
}

impl FieldWireMeta {
    pub fn merge(many: Vec<Self>) -> Self {
        let mut result = Self::default();
        for item in many {
            if item.ordinal.is_some() {
                result.ordinal = item.ordinal;
            }

            result.skip |= item.skip;
        }
        result
    }
}
