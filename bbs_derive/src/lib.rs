use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{Data, Fields};

/// Per-field options of the [Bbs] derive.
///
/// A field is either encoded through a codec marker type (`codec = ...`,
/// defaulting to the canonical codec of the field type) or is a fixed byte
/// constant (`constant = b"..."`, field type `()`).
struct BbsField {
    codec: proc_macro2::TokenStream,
    constant: Option<syn::LitByteStr>,
}

impl Default for BbsField {
    fn default() -> Self {
        BbsField {
            codec: quote! { bbs_builder::codec::Default },
            constant: None,
        }
    }
}

impl Parse for BbsField {
    fn parse(s: ParseStream) -> syn::Result<Self> {
        let mut codec = quote! { bbs_builder::codec::Default };
        let mut constant = None;
        loop {
            let ident: syn::Ident = s.parse()?;
            match &ident.to_string() as &str {
                "codec" => {
                    let _: syn::Token![=] = s.parse()?;
                    let e: syn::Type = s.parse()?;
                    codec = quote! {#e};
                }
                "constant" => {
                    let _: syn::Token![=] = s.parse()?;
                    let value: syn::LitByteStr = s.parse()?;
                    constant = Some(value);
                }
                other => {
                    return Err(s.error(format!("Unexpected identifier: {other}")));
                }
            }
            if s.parse::<syn::Token![,]>().is_err() {
                break;
            }
        }
        Ok(BbsField { codec, constant })
    }
}

struct BbsMsgType {
    number: u8,
}

impl Parse for BbsMsgType {
    fn parse(s: ParseStream) -> syn::Result<Self> {
        let value: syn::LitInt = s.parse()?;
        Ok(BbsMsgType {
            number: value.base10_parse::<u8>()?,
        })
    }
}

/// Serializes one field of a struct.
fn derive_encode_field(field: &syn::Field, options: &BbsField) -> proc_macro2::TokenStream {
    let name = field.ident.as_ref().unwrap();
    let ty = &field.ty;
    match &options.constant {
        Some(constant) => quote! {
            let _ = &input.#name;
            output.extend_from_slice(#constant);
        },
        None => {
            let codec = &options.codec;
            quote! {
                output.extend(<#codec as bbs_builder::codec::Encoding<#ty>>::encode(&input.#name)?);
            }
        }
    }
}

/// Deserializes one field of a struct.
///
/// Fields are consumed in declaration order; the declaration order of the
/// struct is the wire order of the message. The generated code is
/// unhygienic (it binds the field name as a local) and shall only be used
/// inside [derive_decode].
fn derive_decode_field(field: &syn::Field, options: &BbsField) -> proc_macro2::TokenStream {
    let name = field.ident.as_ref().unwrap();
    let ty = &field.ty;
    match &options.constant {
        Some(constant) => {
            let len = constant.value().len();
            quote! {
                if bytes.len() < #len {
                    return Err(bbs_builder::CodecError::IncompleteData);
                }
                if &bytes[..#len] != #constant {
                    return Err(bbs_builder::CodecError::ConstantMismatch {
                        expected: #constant.to_vec(),
                        found: bytes[..#len].to_vec(),
                    });
                }
                let #name = ();
                bytes = &bytes[#len..];
            }
        }
        None => {
            let codec = &options.codec;
            quote! {
                let (#name, rest) = <#codec as bbs_builder::codec::Encoding<#ty>>::decode(bytes)?;
                bytes = rest;
            }
        }
    }
}

fn derive_encode(
    fields: &syn::FieldsNamed,
    field_options: &[BbsField],
    name: &syn::Ident,
    msg_type: &Option<BbsMsgType>,
) -> proc_macro2::TokenStream {
    let field_tokens = fields
        .named
        .iter()
        .zip(field_options.iter())
        .map(|(field, options)| derive_encode_field(field, options));

    let type_byte = match msg_type {
        None => quote! {},
        Some(_) => quote! {
            output.push(<#name as bbs_builder::BbsMessage>::MSG_TYPE);
        },
    };

    quote! {
        fn encode(input: &#name) -> bbs_builder::CodecResult<Vec<u8>> {
            let mut output = Vec::new();
            #type_byte
            #(#field_tokens)*
            Ok(output)
        }
    }
}

fn derive_decode(
    fields: &syn::FieldsNamed,
    field_options: &[BbsField],
    name: &syn::Ident,
    msg_type: &Option<BbsMsgType>,
) -> proc_macro2::TokenStream {
    let field_names: Vec<_> = fields
        .named
        .iter()
        .map(|f| f.ident.as_ref().unwrap())
        .collect();
    let field_tokens = fields
        .named
        .iter()
        .zip(field_options.iter())
        .map(|(field, options)| derive_decode_field(field, options));

    let type_byte = match msg_type {
        None => quote! {},
        Some(_) => quote! {
            match bytes.first() {
                None => return Err(bbs_builder::CodecError::IncompleteData),
                Some(&b) if b == <#name as bbs_builder::BbsMessage>::MSG_TYPE => {}
                Some(&b) => {
                    return Err(bbs_builder::CodecError::ConstantMismatch {
                        expected: vec![<#name as bbs_builder::BbsMessage>::MSG_TYPE],
                        found: vec![b],
                    })
                }
            }
            bytes = &bytes[1..];
        },
    };

    quote! {
        fn decode(bytes: &[u8]) -> bbs_builder::CodecResult<(#name, &[u8])> {
            let mut bytes = bytes;
            #type_byte
            #(#field_tokens)*
            Ok((#name {
                #(#field_names),*
            }, bytes))
        }
    }
}

fn derive_message_trait(
    name: &syn::Ident,
    msg_type: &Option<BbsMsgType>,
) -> proc_macro2::TokenStream {
    match msg_type {
        None => quote! {},
        Some(opts) => {
            let number = opts.number;
            quote! {
                impl bbs_builder::BbsMessage for #name {
                    const MSG_TYPE: u8 = #number;
                }
            }
        }
    }
}

fn derive(ast: &syn::DeriveInput) -> proc_macro::TokenStream {
    let Data::Struct(ref s) = ast.data else {
        panic!("Only structs are supported");
    };

    let Fields::Named(ref fields) = s.fields else {
        panic!("Only named structs are supported");
    };

    let name = &ast.ident;

    // The struct-level option (the message type byte).
    let mut msg_type = None;
    for attr in &ast.attrs {
        if attr.path().is_ident("bbs_msg_type") {
            if msg_type.is_some() {
                panic!("Duplicated `bbs_msg_type` attribute.")
            }
            let syn::Meta::List(meta) = &attr.meta else {
                panic!("We only support list attributes");
            };
            msg_type = Some(syn::parse::<BbsMsgType>(meta.tokens.clone().into()).unwrap());
        }
    }

    // The field options.
    let mut field_options = Vec::new();
    for f in &fields.named {
        let bbs_attrs: Vec<_> = f
            .attrs
            .iter()
            .filter(|attr| attr.path().is_ident("bbs"))
            .collect();
        let other_attrs: Vec<_> = f
            .attrs
            .iter()
            .filter(|attr| !attr.path().is_ident("bbs") && !attr.path().is_ident("doc"))
            .collect();
        if let Some(attr) = other_attrs.first() {
            panic!("Unsupported attribute {:?}", attr.path().get_ident());
        }
        let options = match bbs_attrs.len() {
            0 => BbsField::default(),
            1 => {
                let attr = bbs_attrs[0];
                let syn::Meta::List(meta) = &attr.meta else {
                    panic!("We only support list attributes");
                };
                syn::parse(meta.tokens.clone().into()).unwrap()
            }
            _ => panic!("Bbs supports only one attribute per field."),
        };
        field_options.push(options);
    }

    let encode = derive_encode(fields, &field_options, name, &msg_type);
    let decode = derive_decode(fields, &field_options, name, &msg_type);
    let message = derive_message_trait(name, &msg_type);

    let gen = quote! {
        impl bbs_builder::codec::Encoding<#name> for bbs_builder::codec::Default {
            #encode
            #decode
        }

        #message
    };
    gen.into()
}

/// Derives the wire codec of a message struct.
///
/// The declaration order of the fields is the wire order. An optional
/// `#[bbs_msg_type(0xNN)]` attribute prefixes the one byte type
/// discriminator and validates it on decode.
#[proc_macro_derive(Bbs, attributes(bbs, bbs_msg_type))]
pub fn parser(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast = syn::parse(input).unwrap();
    derive(&ast)
}

/// Derives the codec of a discriminated message union.
///
/// Decoding examines the first byte and delegates the full buffer to every
/// variant whose type constant matches, in declaration order, accepting the
/// first successful parse. Several message types may therefore share one
/// type byte as long as their bodies are distinguishable.
#[proc_macro_derive(BbsEnum)]
pub fn bbs_enum(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast: syn::DeriveInput = syn::parse(input).unwrap();
    let Data::Enum(ref s) = ast.data else {
        panic!("Only enums are supported - it's in the name");
    };
    let mut encode_arms = Vec::new();
    let mut decode_arms = Vec::new();
    for variant in &s.variants {
        let Fields::Unnamed(field) = &variant.fields else {
            panic!("We need unnamed fields");
        };
        if field.unnamed.len() != 1 {
            panic!("We need only one element");
        }
        let var = &variant.ident;
        let ty = &field.unnamed[0].ty;
        let name = &ast.ident;
        encode_arms.push(quote! {
            #name::#var(inner) => <bbs_builder::codec::Default as bbs_builder::codec::Encoding<#ty>>::encode(inner),
        });
        decode_arms.push(quote! {
            if kind == <#ty as bbs_builder::BbsMessage>::MSG_TYPE {
                match <bbs_builder::codec::Default as bbs_builder::codec::Encoding<#ty>>::decode(bytes) {
                    Ok((inner, rest)) => return Ok((#name::#var(inner), rest)),
                    Err(err) => last_err = err,
                }
            }
        });
    }
    let name = ast.ident;
    quote! {
        impl bbs_builder::codec::Encoding<#name> for bbs_builder::codec::Default {
            fn encode(input: &#name) -> bbs_builder::CodecResult<Vec<u8>> {
                match input {
                    #(#encode_arms)*
                }
            }

            fn decode(bytes: &[u8]) -> bbs_builder::CodecResult<(#name, &[u8])> {
                let Some(&kind) = bytes.first() else {
                    return Err(bbs_builder::CodecError::IncompleteData);
                };
                let mut last_err = bbs_builder::CodecError::UnknownMessageType(kind);
                #(#decode_arms)*
                Err(last_err)
            }
        }
    }
    .into()
}

/// Derives the codec of a token enum.
///
/// Every unit variant carries a `#[bbs_token(b"...")]` attribute with one or
/// more byte tokens; all tokens of an enum share a common length. The first
/// token of a variant is canonical and used when encoding.
#[proc_macro_derive(BbsToken, attributes(bbs_token))]
pub fn bbs_token(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast: syn::DeriveInput = syn::parse(input).unwrap();
    let Data::Enum(ref s) = ast.data else {
        panic!("Only enums are supported");
    };
    let name = &ast.ident;

    let mut size = None;
    let mut encode_arms = Vec::new();
    let mut decode_arms = Vec::new();
    for variant in &s.variants {
        let Fields::Unit = &variant.fields else {
            panic!("We need unit variants");
        };
        let var = &variant.ident;
        let attr = variant
            .attrs
            .iter()
            .find(|a| a.path().is_ident("bbs_token"))
            .unwrap_or_else(|| panic!("Variant {var} is missing a `bbs_token` attribute"));
        let syn::Meta::List(meta) = &attr.meta else {
            panic!("We only support list attributes");
        };
        let tokens = meta
            .parse_args_with(
                syn::punctuated::Punctuated::<syn::LitByteStr, syn::Token![,]>::parse_terminated,
            )
            .unwrap();
        if tokens.is_empty() {
            panic!("Variant {var} needs at least one token");
        }
        for token in &tokens {
            match size {
                None => size = Some(token.value().len()),
                Some(size) => {
                    if token.value().len() != size {
                        panic!("Token sizes of {name} do not match");
                    }
                }
            }
            decode_arms.push(quote! {
                if token == &#token[..] {
                    return Ok((#name::#var, &bytes[SIZE..]));
                }
            });
        }
        let canonical = &tokens[0];
        encode_arms.push(quote! {
            #name::#var => #canonical.to_vec(),
        });
    }
    let size = size.expect("token enums cannot be empty");

    quote! {
        impl bbs_builder::codec::Encoding<#name> for bbs_builder::codec::Default {
            fn encode(input: &#name) -> bbs_builder::CodecResult<Vec<u8>> {
                Ok(match input {
                    #(#encode_arms)*
                })
            }

            fn decode(bytes: &[u8]) -> bbs_builder::CodecResult<(#name, &[u8])> {
                const SIZE: usize = #size;
                if bytes.len() < SIZE {
                    return Err(bbs_builder::CodecError::IncompleteData);
                }
                let token = &bytes[..SIZE];
                #(#decode_arms)*
                Err(bbs_builder::CodecError::UnknownToken(token.to_vec()))
            }
        }
    }
    .into()
}
