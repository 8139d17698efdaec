use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, Ident, LitStr, Path, Token, Type, bracketed};

/// One entry of a `[...]` list: a class, a `dyn Trait` type or an expression.
pub struct Item {
    pub attrs: Vec<Attribute>,
    pub value: ItemValue,
}

pub enum ItemValue {
    Type(Type),
    Expr(Expr),
}

impl Parse for Item {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let value = if input.peek(Token![dyn]) {
            ItemValue::Type(input.parse()?)
        } else {
            ItemValue::Expr(input.parse()?)
        };
        Ok(Item { attrs, value })
    }
}

impl Item {
    /// The item as a class path. `SCREAMING_CASE` paths are constants, not classes.
    pub fn class(&self) -> Option<&Path> {
        let ItemValue::Expr(Expr::Path(expr)) = &self.value else {
            return None;
        };
        if expr.qself.is_some() {
            return None;
        }
        let last = expr.path.segments.last()?.ident.to_string();
        let constant = last
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if constant { None } else { Some(&expr.path) }
    }

    pub fn tokens(&self) -> TokenStream2 {
        match &self.value {
            ItemValue::Type(ty) => quote!(#ty),
            ItemValue::Expr(expr) => quote!(#expr),
        }
    }
}

pub fn parse_items(input: ParseStream) -> syn::Result<Vec<Item>> {
    Ok(Punctuated::<Item, Token![,]>::parse_terminated(input)?
        .into_iter()
        .collect())
}

pub enum ArgValue {
    Flag,
    Str(LitStr),
    List(Vec<Item>),
}

/// `key = "str"`, `key = [a, b]` and bare `flag` arguments.
pub struct Args {
    entries: Vec<(Ident, ArgValue)>,
}

impl Parse for Args {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut entries = Vec::new();
        while !input.is_empty() {
            let name: Ident = input.parse()?;
            let value = if input.peek(Token![=]) {
                input.parse::<Token![=]>()?;
                if input.peek(syn::token::Bracket) {
                    let content;
                    bracketed!(content in input);
                    ArgValue::List(parse_items(&content)?)
                } else {
                    ArgValue::Str(input.parse()?)
                }
            } else {
                ArgValue::Flag
            };
            entries.push((name, value));

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(Args { entries })
    }
}

impl Args {
    /// Rejects keys outside `allowed`.
    pub fn check(&self, allowed: &[&str]) -> syn::Result<()> {
        for (name, _) in &self.entries {
            if !allowed.iter().any(|key| name == key) {
                return Err(syn::Error::new(
                    name.span(),
                    format!("unknown argument `{}`, expected one of: {}", name, allowed.join(", ")),
                ));
            }
        }
        Ok(())
    }

    pub fn str(&self, key: &str) -> Option<&LitStr> {
        self.entries.iter().find_map(|(name, value)| match value {
            ArgValue::Str(lit) if name == key => Some(lit),
            _ => None,
        })
    }

    pub fn list(&self, key: &str) -> &[Item] {
        self.entries
            .iter()
            .find_map(|(name, value)| match value {
                ArgValue::List(items) if name == key => Some(items.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn flag(&self, key: &str) -> bool {
        self.entries
            .iter()
            .any(|(name, value)| name == key && matches!(value, ArgValue::Flag))
    }
}

/// A `Component<dyn Capability>` for a class or a pre-built instance.
pub fn component(capability: &TokenStream2, item: &Item) -> TokenStream2 {
    match item.class() {
        Some(class) => quote!(::keel::di::Component::<#capability>::of::<#class>()),
        None => {
            let value = item.tokens();
            quote!(::keel::di::Component::<#capability>::instance(#value))
        }
    }
}

pub fn components(capability: &TokenStream2, items: &[Item]) -> Vec<TokenStream2> {
    items.iter().map(|item| component(capability, item)).collect()
}

pub fn guard() -> TokenStream2 {
    quote!(dyn ::keel::guard::Guard)
}

pub fn middleware() -> TokenStream2 {
    quote!(dyn ::keel::middleware::Middleware)
}

pub fn interceptor() -> TokenStream2 {
    quote!(dyn ::keel::interceptor::Interceptor)
}

pub fn pipe() -> TokenStream2 {
    quote!(dyn ::keel::pipe::Pipe)
}

pub fn filter() -> TokenStream2 {
    quote!(dyn ::keel::exception::ExceptionFilter)
}

pub fn ws_filter() -> TokenStream2 {
    quote!(dyn ::keel::websocket::WsExceptionFilter)
}

/// Whether `attr` is one of the bare attribute names in `names`.
pub fn is_any(attr: &Attribute, names: &[&str]) -> bool {
    attr.path()
        .get_ident()
        .is_some_and(|ident| names.iter().any(|name| ident == name))
}
