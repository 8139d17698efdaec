use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, FnArg, ImplItem, ImplItemFn, ItemImpl, ItemStruct, LitStr, Type, parse_macro_input};

use crate::args::{self, Args, Item, is_any, parse_items};

const MESSAGE_ATTRS: [&str; 2] = ["subscribe_message", "use_filters"];
const PARAM_ATTRS: [&str; 2] = ["message_body", "connected_socket"];

pub fn gateway_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as Args);
    let input = parse_macro_input!(item as ItemStruct);
    match generate_gateway_impl(&args, input) {
        Ok(expanded) => expanded.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn generate_gateway_impl(args: &Args, mut input: ItemStruct) -> syn::Result<TokenStream2> {
    args.check(&["filters", "on_init", "on_connection", "on_disconnect"])?;
    let struct_name = &input.ident;
    let filters = args::components(&args::ws_filter(), args.list("filters"));

    let mut hooks = Vec::new();
    if args.flag("on_init") {
        hooks.push(quote!(.on_init::<Self>()));
    }
    if args.flag("on_connection") {
        hooks.push(quote!(.on_connection::<Self>()));
    }
    if args.flag("on_disconnect") {
        hooks.push(quote!(.on_disconnect::<Self>()));
    }

    input
        .attrs
        .insert(0, syn::parse_quote!(#[derive(::keel::Injectable)]));

    Ok(quote! {
        #input

        impl #struct_name {
            #[doc(hidden)]
            pub fn __gateway_metadata() -> ::keel::websocket::GatewayMetadata {
                ::keel::websocket::GatewayMetadata::new()
                    .filters([#(#filters),*])
                    .hooks(::keel::websocket::GatewayHooks::new() #(#hooks)*)
            }
        }
    })
}

enum WsParamKind {
    Body,
    Socket,
}

struct MessageInfo {
    event: LitStr,
    fn_name: syn::Ident,
    is_async: bool,
    params: Vec<(WsParamKind, Type)>,
    filters: Vec<Item>,
}

pub fn messages_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    match generate_messages_impl(input) {
        Ok(expanded) => expanded.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn generate_messages_impl(mut input: ItemImpl) -> syn::Result<TokenStream2> {
    let mut handlers = Vec::new();
    for item in input.items.iter_mut() {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        if let Some(handler) = extract_message_info(method)? {
            handlers.push(handler);
        }
        method.attrs.retain(|attr| !is_any(attr, &MESSAGE_ATTRS));
        for input in method.sig.inputs.iter_mut() {
            if let FnArg::Typed(pat_type) = input {
                pat_type.attrs.retain(|attr| !is_any(attr, &PARAM_ATTRS));
            }
        }
    }

    let registrations = handlers.iter().map(handler_metadata);
    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        #input

        impl #impl_generics ::keel::websocket::Gateway for #self_ty #where_clause {
            fn metadata() -> ::keel::websocket::GatewayMetadata {
                Self::__gateway_metadata()
                    #(.handler(#registrations))*
            }
        }
    })
}

fn handler_metadata(handler: &MessageInfo) -> TokenStream2 {
    let event = &handler.event;
    let fn_name = &handler.fn_name;
    let handler_name = fn_name.to_string();

    let mut params = Vec::new();
    let mut bindings = Vec::new();
    let mut call_args = Vec::new();
    for (index, (kind, ty)) in handler.params.iter().enumerate() {
        let var = quote::format_ident!("__p_{}", index);
        let (param, take) = match kind {
            WsParamKind::Body => (quote!(Body), quote!(args.body::<#ty>(#index)?)),
            WsParamKind::Socket => (quote!(Socket), quote!(args.socket(#index)?)),
        };
        params.push(quote!(.param(::keel::websocket::WsParam::#param)));
        bindings.push(quote!(let #var: #ty = #take;));
        call_args.push(var);
    }

    let args_pat = if bindings.is_empty() {
        quote!(_args)
    } else {
        quote!(mut args)
    };
    let call = if handler.is_async {
        quote!(gateway.#fn_name(#(#call_args),*).await)
    } else {
        quote!(gateway.#fn_name(#(#call_args),*))
    };
    let filters = args::components(&args::ws_filter(), &handler.filters);

    quote! {
        ::keel::websocket::MessageHandlerMetadata::new(
            #event,
            #handler_name,
            ::keel::websocket::WsHandlerFn::new(
                |gateway: ::std::sync::Arc<Self>, #args_pat: ::keel::websocket::WsArguments| async move {
                    #(#bindings)*
                    ::keel::websocket::WsReply::into_frame(#call)
                },
            ),
        )
        #(#params)*
        .filters([#(#filters),*])
    }
}

fn extract_message_info(method: &ImplItemFn) -> syn::Result<Option<MessageInfo>> {
    let mut event = None;
    let mut filters = Vec::new();
    for attr in &method.attrs {
        if attr.path().is_ident("subscribe_message") {
            event = Some(attr.parse_args::<LitStr>()?);
        } else if attr.path().is_ident("use_filters") {
            filters.extend(attr.parse_args_with(parse_items)?);
        }
    }
    let Some(event) = event else {
        return Ok(None);
    };

    let mut params = Vec::new();
    for input in method.sig.inputs.iter() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let kind = param_kind(&pat_type.attrs).ok_or_else(|| {
            syn::Error::new_spanned(
                &pat_type.ty,
                "message handler parameters need #[message_body] or #[connected_socket]",
            )
        })?;
        params.push((kind, (*pat_type.ty).clone()));
    }

    Ok(Some(MessageInfo {
        event,
        fn_name: method.sig.ident.clone(),
        is_async: method.sig.asyncness.is_some(),
        params,
        filters,
    }))
}

fn param_kind(attrs: &[Attribute]) -> Option<WsParamKind> {
    attrs.iter().find_map(|attr| {
        if attr.path().is_ident("message_body") {
            Some(WsParamKind::Body)
        } else if attr.path().is_ident("connected_socket") {
            Some(WsParamKind::Socket)
        } else {
            None
        }
    })
}
