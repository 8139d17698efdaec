use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{ItemStruct, parse_macro_input};

use crate::args::{Args, Item, ItemValue};

pub fn module_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as Args);
    let input = parse_macro_input!(item as ItemStruct);
    match generate_module_impl(&args, &input) {
        Ok(expanded) => expanded.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn generate_module_impl(args: &Args, input: &ItemStruct) -> syn::Result<TokenStream2> {
    args.check(&["imports", "controllers", "providers", "gateways", "exports", "global"])?;
    let module_name = &input.ident;

    // A module type, or a configured module such as `ConfigModule::for_root(..)`.
    let imports = args.list("imports").iter().map(|item| {
        let value = match item.class() {
            Some(class) => quote!(::keel::module::ModuleDef::of::<#class>()),
            None => {
                let expr = item.tokens();
                quote!(::keel::module::ModuleDef::from(#expr))
            }
        };
        step(item, quote!(import(#value)))
    });

    let providers = args.list("providers").iter().map(|item| {
        let value = match item.class() {
            Some(class) => quote!(::keel::di::Provider::class::<#class>()),
            None => item.tokens(),
        };
        step(item, quote!(provider(#value)))
    });

    let controllers = args.list("controllers").iter().map(|item| {
        let class = item.tokens();
        step(item, quote!(controller(::keel::controller::ControllerDef::of::<#class>())))
    });

    let gateways = args.list("gateways").iter().map(|item| {
        let class = item.tokens();
        step(item, quote!(gateway(::keel::websocket::GatewayDef::of::<#class>())))
    });

    // Classes and `dyn Trait` types export their type token; anything else
    // is a token value.
    let exports = args.list("exports").iter().map(|item| {
        let token = match (&item.value, item.class()) {
            (ItemValue::Type(ty), _) => quote!(::keel::di::Token::of::<#ty>()),
            (_, Some(class)) => quote!(::keel::di::Token::of::<#class>()),
            (_, None) => {
                let expr = item.tokens();
                quote!(::keel::di::Token::from(#expr))
            }
        };
        step(item, quote!(export(#token)))
    });

    let global = args.flag("global");

    Ok(quote! {
        #input

        impl ::keel::module::Module for #module_name {
            fn metadata() -> ::keel::module::ModuleMetadata {
                #[allow(unused_mut)]
                let mut metadata = ::keel::module::ModuleMetadata::new().global(#global);
                #(#imports)*
                #(#providers)*
                #(#controllers)*
                #(#gateways)*
                #(#exports)*
                metadata
            }
        }
    })
}

/// One builder call, keeping the item's attributes (e.g. `#[cfg(..)]`).
fn step(item: &Item, call: TokenStream2) -> TokenStream2 {
    let attrs = &item.attrs;
    quote! {
        #(#attrs)*
        {
            metadata = metadata.#call;
        }
    }
}
