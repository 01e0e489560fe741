use crate::utils::apply_derives;
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use std::collections::HashMap;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Expr, Ident, Item, LitStr, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input,
};

/// #[event_map] 宏实现
/// - 仅支持非泛型、非空枚举；变体可为具名、元组或单元形式
/// - 追加 serde 派生，生成 `<Enum>Kind` 种类枚举
/// - 生成 `::eventide_core::typed::{EventMap, EventKind}` 实现
/// - 支持：`#[event_map(prefix = "...", kind = Ident)]`（枚举级）
/// - 变体可覆写：`#[event(name = "...")]`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EventMapAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let enum_item = match &mut input {
        Item::Enum(e) => e,
        other => {
            return syn::Error::new(other.span(), "#[event_map] can only be used on enum types")
                .to_compile_error()
                .into();
        }
    };

    if !enum_item.generics.params.is_empty() {
        return syn::Error::new(
            enum_item.generics.span(),
            "#[event_map] does not support generic enums",
        )
        .to_compile_error()
        .into();
    }
    if enum_item.variants.is_empty() {
        return syn::Error::new(
            enum_item.ident.span(),
            "#[event_map] requires at least one variant",
        )
        .to_compile_error()
        .into();
    }

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    apply_derives(&mut enum_item.attrs, required);

    let enum_ident = enum_item.ident.clone();
    let prefix = cfg
        .prefix
        .map(|lit| lit.value())
        .unwrap_or_else(|| enum_ident.to_string());

    // 变体名 -> 事件名；同时检查事件名冲突
    let mut names: Vec<(Ident, LitStr)> = Vec::new();
    let mut seen: HashMap<String, Ident> = HashMap::new();

    for v in &mut enum_item.variants {
        let mut retained_attrs = Vec::new();
        let mut name_lit: Option<LitStr> = None;

        for attr in v.attrs.iter() {
            if !attr.path().is_ident("event") {
                retained_attrs.push(attr.clone());
                continue;
            }
            match parse_variant_event_attr(attr) {
                Ok(Some(lit)) => {
                    if name_lit.is_some() {
                        return syn::Error::new(
                            attr.span(),
                            "duplicate 'name' specified for this variant",
                        )
                        .to_compile_error()
                        .into();
                    }
                    name_lit = Some(lit);
                }
                Ok(None) => {}
                Err(err) => return err.to_compile_error().into(),
            }
        }
        v.attrs = retained_attrs;

        let lit = name_lit.unwrap_or_else(|| {
            LitStr::new(&format!("{}.{}", prefix, v.ident), v.ident.span())
        });
        if let Some(previous) = seen.insert(lit.value(), v.ident.clone()) {
            return syn::Error::new(
                lit.span(),
                format!(
                    "event name `{}` is already used by variant `{}`",
                    lit.value(),
                    previous
                ),
            )
            .to_compile_error()
            .into();
        }
        names.push((v.ident.clone(), lit));
    }

    let vis = enum_item.vis.clone();
    let kind_ident = cfg
        .kind
        .unwrap_or_else(|| format_ident!("{}Kind", enum_ident));
    let kind_doc = format!("`{enum_ident}` 的事件种类");

    let variant_idents: Vec<&Ident> = names.iter().map(|(ident, _)| ident).collect();
    let name_arms = names.iter().map(|(ident, lit)| quote! { Self::#ident => #lit });
    let kind_arms = variant_idents
        .iter()
        .map(|ident| quote! { Self::#ident { .. } => #kind_ident::#ident });

    let out = quote! {
        #input

        #[doc = #kind_doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #vis enum #kind_ident {
            #( #variant_idents, )*
        }

        impl ::eventide_core::typed::EventKind for #kind_ident {
            const ALL: &'static [Self] = &[ #( Self::#variant_idents, )* ];

            fn name(&self) -> &'static str {
                match self { #( #name_arms, )* }
            }
        }

        impl ::eventide_core::typed::EventMap for #enum_ident {
            type Kind = #kind_ident;

            fn kind(&self) -> Self::Kind {
                match self { #( #kind_arms, )* }
            }
        }
    };

    TokenStream::from(out)
}

// -------- parsing --------

// #[event(name = "...")]；空参数列表视为未指定
fn parse_variant_event_attr(attr: &syn::Attribute) -> Result<Option<LitStr>> {
    let syn::Meta::List(_) = &attr.meta else {
        return Err(syn::Error::new(attr.span(), "expected #[event(name = \"...\")]"));
    };

    let pairs: Punctuated<AttrKv, Token![,]> =
        attr.parse_args_with(Punctuated::<AttrKv, Token![,]>::parse_terminated)?;

    let mut name: Option<LitStr> = None;
    for kv in pairs {
        match kv.key.to_string().as_str() {
            "name" => {
                if name.is_some() {
                    return Err(syn::Error::new(
                        kv.key.span(),
                        "duplicate key 'name' in attribute",
                    ));
                }
                name = Some(expect_str(kv.value, "name")?);
            }
            _ => {
                return Err(syn::Error::new(
                    kv.key.span(),
                    "unknown key; expected 'name'",
                ));
            }
        }
    }
    Ok(name)
}

fn expect_str(value: Expr, key: &str) -> Result<LitStr> {
    match value {
        Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(lit),
            ..
        }) => Ok(lit),
        other => Err(syn::Error::new(
            other.span(),
            format!("expected string literal for '{key}'"),
        )),
    }
}

struct AttrKv {
    key: Ident,
    value: Expr,
}

impl Parse for AttrKv {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        Ok(Self {
            key,
            value: input.parse()?,
        })
    }
}

// 枚举级配置：事件名前缀、种类枚举名
struct EventMapAttrConfig {
    prefix: Option<LitStr>,
    kind: Option<Ident>,
}

impl Parse for EventMapAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut prefix: Option<LitStr> = None;
        let mut kind: Option<Ident> = None;

        let pairs = Punctuated::<AttrKv, Token![,]>::parse_terminated(input)?;
        for kv in pairs {
            match kv.key.to_string().as_str() {
                "prefix" => {
                    if prefix.is_some() {
                        return Err(syn::Error::new(
                            kv.key.span(),
                            "duplicate key 'prefix' in attribute",
                        ));
                    }
                    prefix = Some(expect_str(kv.value, "prefix")?);
                }
                "kind" => {
                    if kind.is_some() {
                        return Err(syn::Error::new(
                            kv.key.span(),
                            "duplicate key 'kind' in attribute",
                        ));
                    }
                    let ident = match kv.value {
                        Expr::Path(p) if p.path.segments.len() == 1 => {
                            p.path.segments[0].ident.clone()
                        }
                        other => {
                            return Err(syn::Error::new(
                                other.span(),
                                "expected identifier for 'kind'",
                            ));
                        }
                    };
                    kind = Some(ident);
                }
                _ => {
                    return Err(syn::Error::new(
                        kv.key.span(),
                        "unknown key; expected 'prefix' | 'kind'",
                    ));
                }
            }
        }

        Ok(Self { prefix, kind })
    }
}
