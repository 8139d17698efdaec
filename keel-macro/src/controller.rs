use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, FnArg, ImplItem, ImplItemFn, ItemImpl, ItemStruct, LitStr, Token, Type, parse_macro_input};

use crate::args::{self, Args, Item, is_any, parse_items};

const HTTP_METHODS: [&str; 7] = ["get", "post", "put", "patch", "delete", "head", "options"];
const HANDLER_ATTRS: [&str; 6] = [
    "use_guards",
    "use_pipes",
    "use_interceptors",
    "use_filters",
    "use_middleware",
    "set_metadata",
];
const PARAM_ATTRS: [&str; 6] = ["req", "query", "param", "body", "file", "valid"];

pub fn controller_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as Args);
    let input = parse_macro_input!(item as ItemStruct);
    match generate_controller_impl(&args, input) {
        Ok(expanded) => expanded.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn generate_controller_impl(args: &Args, mut input: ItemStruct) -> syn::Result<TokenStream2> {
    args.check(&["path", "middleware", "guards", "interceptors", "filters"])?;
    let struct_name = &input.ident;
    let path = args
        .str("path")
        .map(LitStr::value)
        .unwrap_or_else(|| "/".to_string());

    let middleware = args::components(&args::middleware(), args.list("middleware"));
    let guards = args::components(&args::guard(), args.list("guards"));
    let interceptors = args::components(&args::interceptor(), args.list("interceptors"));
    let filters = args::components(&args::filter(), args.list("filters"));

    input
        .attrs
        .insert(0, syn::parse_quote!(#[derive(::keel::Injectable)]));

    Ok(quote! {
        #input

        impl #struct_name {
            #[doc(hidden)]
            pub fn __controller_metadata() -> ::keel::controller::ControllerMetadata {
                ::keel::controller::ControllerMetadata::new(#path)
                    .middleware([#(#middleware),*])
                    .guards([#(#guards),*])
                    .interceptors([#(#interceptors),*])
                    .filters([#(#filters),*])
            }
        }
    })
}

#[derive(Clone, Copy)]
enum ParamKind {
    Req,
    Query,
    Param,
    Body,
    File,
}

struct ParamInfo {
    ty: Type,
    kind: ParamKind,
    key: Option<LitStr>,
    valid: bool,
}

struct RouteInfo {
    method: String,
    path: String,
    fn_name: syn::Ident,
    is_async: bool,
    params: Vec<ParamInfo>,
    middleware: Vec<Item>,
    guards: Vec<Item>,
    pipes: Vec<Item>,
    interceptors: Vec<Item>,
    filters: Vec<Item>,
    metadata: Vec<(LitStr, TokenStream2)>,
}

/// `#[set_metadata("key", value)]`
struct SetMetadata {
    key: LitStr,
    value: TokenStream2,
}

impl Parse for SetMetadata {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let key = input.parse()?;
        input.parse::<Token![,]>()?;
        let value = input.parse()?;
        Ok(SetMetadata { key, value })
    }
}

pub fn routes_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    match generate_routes_impl(input) {
        Ok(expanded) => expanded.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn generate_routes_impl(mut input: ItemImpl) -> syn::Result<TokenStream2> {
    let mut routes = Vec::new();
    for item in input.items.iter_mut() {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        if let Some(route) = extract_route_info(method)? {
            routes.push(route);
        }
        method
            .attrs
            .retain(|attr| !is_any(attr, &HTTP_METHODS) && !is_any(attr, &HANDLER_ATTRS));
        for input in method.sig.inputs.iter_mut() {
            if let FnArg::Typed(pat_type) = input {
                pat_type.attrs.retain(|attr| !is_any(attr, &PARAM_ATTRS));
            }
        }
    }

    let route_registrations = routes.iter().map(route_metadata);
    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        #input

        impl #impl_generics ::keel::controller::Controller for #self_ty #where_clause {
            fn metadata() -> ::keel::controller::ControllerMetadata {
                Self::__controller_metadata()
                    #(.route(#route_registrations))*
            }
        }
    })
}

fn route_metadata(route: &RouteInfo) -> TokenStream2 {
    let method = syn::Ident::new(&route.method.to_uppercase(), proc_macro2::Span::call_site());
    let path = &route.path;
    let fn_name = &route.fn_name;
    let handler_name = fn_name.to_string();

    let mut params = Vec::new();
    let mut bindings = Vec::new();
    let mut call_args = Vec::new();
    for (index, param) in route.params.iter().enumerate() {
        let ty = &param.ty;
        let var = quote::format_ident!("__p_{}", index);
        let source = match param.kind {
            ParamKind::Req => quote!(Request),
            ParamKind::Query => quote!(Query),
            ParamKind::Param => quote!(Param),
            ParamKind::Body => quote!(Body),
            ParamKind::File => quote!(File),
        };
        let key = match &param.key {
            Some(key) => quote!(::core::option::Option::Some(#key)),
            None => quote!(::core::option::Option::None),
        };
        let param_type = if param.valid {
            quote!(::keel::controller::ParamType::validated::<#ty>())
        } else {
            quote!(::keel::controller::ParamType::of::<#ty>())
        };
        params.push(quote! {
            .param(::keel::controller::ParamMetadata::new(
                ::keel::controller::ParamSource::#source,
                #key,
                #param_type,
            ))
        });

        let take = match param.kind {
            ParamKind::Req => quote!(args.request(#index)?),
            ParamKind::File if is_option(ty) => quote!(args.file(#index)?),
            ParamKind::File => quote!(args.file_required(#index)?),
            _ => quote!(args.json::<#ty>(#index)?),
        };
        bindings.push(quote!(let #var: #ty = #take;));
        call_args.push(var);
    }

    let args_pat = if bindings.is_empty() {
        quote!(_args)
    } else {
        quote!(mut args)
    };
    let call = if route.is_async {
        quote!(controller.#fn_name(#(#call_args),*).await)
    } else {
        quote!(controller.#fn_name(#(#call_args),*))
    };

    let middleware = args::components(&args::middleware(), &route.middleware);
    let guards = args::components(&args::guard(), &route.guards);
    let pipes = args::components(&args::pipe(), &route.pipes);
    let interceptors = args::components(&args::interceptor(), &route.interceptors);
    let filters = args::components(&args::filter(), &route.filters);
    let metadata = route.metadata.iter().map(|(key, value)| {
        quote!(.metadata(#key, ::keel::__private::serde_json::json!(#value)))
    });

    quote! {
        ::keel::controller::RouteMetadata::new(
            ::keel::http::Method::#method,
            #path,
            #handler_name,
            ::keel::controller::HandlerFn::new(
                |controller: ::std::sync::Arc<Self>, #args_pat: ::keel::controller::Arguments| async move {
                    #(#bindings)*
                    ::keel::controller::Responder::respond(#call)
                },
            ),
        )
        #(#params)*
        .middleware([#(#middleware),*])
        .guards([#(#guards),*])
        .pipes([#(#pipes),*])
        .interceptors([#(#interceptors),*])
        .filters([#(#filters),*])
        #(#metadata)*
    }
}

fn extract_route_info(method: &ImplItemFn) -> syn::Result<Option<RouteInfo>> {
    let mut http_method = None;
    let mut path = String::new();
    let mut route = RouteInfo {
        method: String::new(),
        path: String::new(),
        fn_name: method.sig.ident.clone(),
        is_async: method.sig.asyncness.is_some(),
        params: Vec::new(),
        middleware: Vec::new(),
        guards: Vec::new(),
        pipes: Vec::new(),
        interceptors: Vec::new(),
        filters: Vec::new(),
        metadata: Vec::new(),
    };

    for attr in &method.attrs {
        let Some(ident) = attr.path().get_ident() else {
            continue;
        };
        let name = ident.to_string();
        match name.as_str() {
            m if HTTP_METHODS.contains(&m) => {
                http_method = Some(name.clone());
                if let syn::Meta::List(_) = &attr.meta {
                    path = attr.parse_args::<LitStr>()?.value();
                }
            }
            "use_guards" => route.guards.extend(attr.parse_args_with(parse_items)?),
            "use_pipes" => route.pipes.extend(attr.parse_args_with(parse_items)?),
            "use_interceptors" => route.interceptors.extend(attr.parse_args_with(parse_items)?),
            "use_filters" => route.filters.extend(attr.parse_args_with(parse_items)?),
            "use_middleware" => route.middleware.extend(attr.parse_args_with(parse_items)?),
            "set_metadata" => {
                let SetMetadata { key, value } = attr.parse_args()?;
                route.metadata.push((key, value));
            }
            _ => {}
        }
    }
    let Some(http_method) = http_method else {
        return Ok(None);
    };
    route.method = http_method;
    route.path = path;

    for input in method.sig.inputs.iter() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        route.params.push(param_info(&pat_type.attrs, &pat_type.ty)?);
    }
    Ok(Some(route))
}

fn param_info(attrs: &[Attribute], ty: &Type) -> syn::Result<ParamInfo> {
    let mut kind = None;
    let mut key = None;
    let mut valid = false;
    for attr in attrs {
        let Some(ident) = attr.path().get_ident() else {
            continue;
        };
        let found = match ident.to_string().as_str() {
            "req" => ParamKind::Req,
            "query" => ParamKind::Query,
            "param" => ParamKind::Param,
            "body" => ParamKind::Body,
            "file" => ParamKind::File,
            "valid" => {
                valid = true;
                continue;
            }
            _ => continue,
        };
        if let syn::Meta::List(_) = &attr.meta {
            key = Some(attr.parse_args::<LitStr>()?);
        }
        kind = Some(found);
    }

    let kind = kind.ok_or_else(|| {
        syn::Error::new_spanned(
            ty,
            "route parameters need a binding: #[req], #[query], #[param], #[body] or #[file]",
        )
    })?;
    Ok(ParamInfo {
        ty: ty.clone(),
        kind,
        key,
        valid,
    })
}

fn is_option(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.path.segments.last().is_some_and(|s| s.ident == "Option"))
}
