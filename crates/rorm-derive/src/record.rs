use std::collections::HashSet;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields};

use crate::attrs::{FieldAttrs, RecordAttrs};

const NOT_A_STRUCT: &str = "model must be struct type: Record can only be derived for structs with named fields";

// derive_record
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };
    expand(&input).unwrap_or_else(Error::into_compile_error)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) if !named.named.is_empty() => &named.named,
            Fields::Named(_) => {
                return Err(Error::new_spanned(ident, "Record requires at least one field"))
            }
            other => return Err(Error::new_spanned(other, NOT_A_STRUCT)),
        },
        _ => return Err(Error::new_spanned(ident, NOT_A_STRUCT)),
    };

    let record_attrs = RecordAttrs::parse(&input.attrs)?;
    let type_name = match &record_attrs.name {
        Some(name) => quote!(#name),
        None => {
            let ident_str = ident.to_string();
            quote!(::core::concat!(::core::module_path!(), "::", #ident_str))
        }
    };

    let mut seen = HashSet::new();
    let mut descriptors = Vec::with_capacity(fields.len());
    let mut encode_arms = Vec::with_capacity(fields.len());
    let mut decode_arms = Vec::with_capacity(fields.len());
    let mut key_text_arms = Vec::with_capacity(fields.len());
    let mut nested_arms = Vec::with_capacity(fields.len());
    let mut attach_arms = Vec::with_capacity(fields.len());

    for (index, field) in fields.iter().enumerate() {
        let Some(field_ident) = field.ident.as_ref() else {
            return Err(Error::new_spanned(field, NOT_A_STRUCT));
        };
        let ty = &field.ty;
        let attrs = FieldAttrs::parse(field)?;
        if !seen.insert(attrs.stored_name.clone()) {
            return Err(Error::new_spanned(
                field,
                format!("duplicate stored field name `{}`", attrs.stored_name),
            ));
        }
        let stored_name = &attrs.stored_name;
        let tag = &attrs.tag;

        descriptors.push(quote! {
            ::rorm::FieldDescriptor::new(
                #stored_name,
                <#ty as ::rorm::FieldValue>::kind(),
                #tag,
            )
            .with_nested(<#ty as ::rorm::FieldValue>::nested_schema())
        });
        encode_arms.push(quote! {
            #index => ::rorm::FieldValue::encode(&self.#field_ident),
        });
        decode_arms.push(quote! {
            #index => ::rorm::decode_into(&mut self.#field_ident, text),
        });
        key_text_arms.push(quote! {
            #index => ::rorm::FieldValue::key_text(&self.#field_ident),
        });
        nested_arms.push(quote! {
            #index => ::rorm::FieldValue::as_model(&self.#field_ident),
        });
        attach_arms.push(quote! {
            #index => ::rorm::FieldValue::attach(&mut self.#field_ident, nested),
        });
    }

    let auto_load = record_attrs.loader.then(|| {
        quote! {
            fn auto_load(
                &mut self,
            ) -> ::core::option::Option<::core::result::Result<(), ::rorm::LoadError>> {
                ::core::option::Option::Some(::rorm::AutoLoad::load(self))
            }
        }
    });

    Ok(quote! {
        const _: () = {
            impl ::rorm::Model for #ident {
                fn schema(&self) -> &'static ::rorm::RecordSchema {
                    <Self as ::rorm::Record>::record_schema()
                }

                fn encode_field(
                    &self,
                    index: usize,
                ) -> ::rorm::CodecResult<::rorm::Encoded> {
                    match index {
                        #(#encode_arms)*
                        _ => ::core::result::Result::Ok(::rorm::Encoded::Null),
                    }
                }

                fn decode_field(
                    &mut self,
                    index: usize,
                    text: &str,
                ) -> ::rorm::CodecResult<::rorm::Decoded<()>> {
                    match index {
                        #(#decode_arms)*
                        _ => ::core::result::Result::Ok(
                            ::rorm::Decoded::Skip(::rorm::SkipReason::Unsupported),
                        ),
                    }
                }

                fn field_key_text(&self, index: usize) -> ::std::string::String {
                    match index {
                        #(#key_text_arms)*
                        _ => ::std::string::String::new(),
                    }
                }

                fn nested_model(
                    &self,
                    index: usize,
                ) -> ::core::option::Option<&dyn ::rorm::Model> {
                    match index {
                        #(#nested_arms)*
                        _ => ::core::option::Option::None,
                    }
                }

                fn attach_nested(
                    &mut self,
                    index: usize,
                    nested: ::std::boxed::Box<dyn ::rorm::Model>,
                ) -> bool {
                    match index {
                        #(#attach_arms)*
                        _ => false,
                    }
                }

                #auto_load

                fn into_any(
                    self: ::std::boxed::Box<Self>,
                ) -> ::std::boxed::Box<dyn ::core::any::Any> {
                    self
                }
            }

            impl ::rorm::Record for #ident {
                fn record_schema() -> &'static ::rorm::RecordSchema {
                    static SCHEMA: ::std::sync::OnceLock<::rorm::RecordSchema> =
                        ::std::sync::OnceLock::new();

                    fn __rorm_new() -> ::std::boxed::Box<dyn ::rorm::Model> {
                        ::std::boxed::Box::new(<#ident as ::core::default::Default>::default())
                    }

                    SCHEMA.get_or_init(|| {
                        ::rorm::RecordSchema::new(
                            #type_name,
                            ::std::vec![#(#descriptors),*],
                            __rorm_new,
                        )
                    })
                }
            }

            impl ::rorm::FieldValue for #ident {
                fn kind() -> ::rorm::FieldKind {
                    ::rorm::FieldKind::Record
                }

                fn encode(&self) -> ::rorm::CodecResult<::rorm::Encoded> {
                    ::core::result::Result::Ok(::rorm::Encoded::Record)
                }

                fn decode(_text: &str) -> ::rorm::CodecResult<::rorm::Decoded<Self>> {
                    ::core::result::Result::Ok(
                        ::rorm::Decoded::Skip(::rorm::SkipReason::Association),
                    )
                }

                fn key_text(&self) -> ::std::string::String {
                    ::rorm::key::nested_key_text(self)
                }

                fn as_model(&self) -> ::core::option::Option<&dyn ::rorm::Model> {
                    ::core::option::Option::Some(self)
                }

                fn nested_schema() -> ::core::option::Option<::rorm::schema::SchemaFn> {
                    ::core::option::Option::Some(
                        <Self as ::rorm::Record>::record_schema
                            as fn() -> &'static ::rorm::RecordSchema,
                    )
                }

                fn attach(&mut self, nested: ::std::boxed::Box<dyn ::rorm::Model>) -> bool {
                    ::rorm::model::attach_record(self, nested)
                }

                fn zeroed() -> ::core::option::Option<Self> {
                    ::core::option::Option::Some(<Self as ::core::default::Default>::default())
                }
            }
        };
    })
}
