use syn::ext::IdentExt;
use syn::{Attribute, Error, Field, LitStr, Result};

const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '\\'];

///
/// RecordAttrs
///

#[derive(Default)]
pub struct RecordAttrs {
    pub name: Option<LitStr>,
    pub loader: bool,
}

impl RecordAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = RecordAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("redis")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let name: LitStr = meta.value()?.parse()?;
                    check_type_name(&name)?;
                    out.name = Some(name);
                    Ok(())
                } else if meta.path.is_ident("loader") {
                    out.loader = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `name = \"...\"` or `loader`"))
                }
            })?;
        }
        Ok(out)
    }
}

fn check_type_name(name: &LitStr) -> Result<()> {
    let value = name.value();
    if value.is_empty() {
        return Err(Error::new_spanned(name, "record name must not be empty"));
    }
    if value.contains(GLOB_CHARS) {
        return Err(Error::new_spanned(
            name,
            "record name must not contain glob characters (* ? [ ] \\)",
        ));
    }
    Ok(())
}

///
/// FieldAttrs
///

pub struct FieldAttrs {
    /// Name of the hash field the value is stored under.
    pub stored_name: String,
    pub tag: String,
}

impl FieldAttrs {
    pub fn parse(field: &Field) -> Result<Self> {
        let mut stored_name = field
            .ident
            .as_ref()
            .map(|ident| ident.unraw().to_string())
            .unwrap_or_default();
        let mut tags: Vec<String> = Vec::new();

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("redis")) {
            if let Ok(tag) = attr.parse_args::<LitStr>() {
                tags.push(tag.value());
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("tag") {
                    let tag: LitStr = meta.value()?.parse()?;
                    tags.push(tag.value());
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    let name: LitStr = meta.value()?.parse()?;
                    if name.value().is_empty() {
                        return Err(Error::new_spanned(name, "field name must not be empty"));
                    }
                    stored_name = name.value();
                    Ok(())
                } else {
                    Err(meta.error("expected a tag string, `tag = \"...\"` or `rename = \"...\"`"))
                }
            })?;
        }

        Ok(FieldAttrs {
            stored_name,
            tag: tags.join(";"),
        })
    }
}
