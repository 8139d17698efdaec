use darling::ast::{Data, Style};
use darling::{FromDeriveInput, FromField, FromMeta};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Expr, ExprLit, GenericArgument, Generics, Ident, Lit, PathArguments, Type, parse_macro_input};

/// `#[inject(token = ...)]`: a string key or a `Token` expression.
struct InjectToken(TokenStream2);

impl FromMeta for InjectToken {
    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        Ok(match expr {
            Expr::Lit(ExprLit {
                lit: Lit::Str(key), ..
            }) => InjectToken(quote!(::keel::di::Token::named(#key))),
            other => InjectToken(quote!(::keel::di::Token::from(#other))),
        })
    }
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    token: Option<InjectToken>,
    #[darling(default)]
    default: bool,
}

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), supports(struct_named, struct_unit))]
struct InjectableInput {
    ident: Ident,
    generics: Generics,
    data: Data<(), InjectField>,
    #[darling(default)]
    scope: Option<String>,
    #[darling(default)]
    on_init: bool,
    #[darling(default)]
    on_bootstrap: bool,
    #[darling(default)]
    on_shutdown: bool,
}

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => expanded.into(),
        Err(error) => error.write_errors().into(),
    }
}

fn expand(input: &DeriveInput) -> darling::Result<TokenStream2> {
    let input = InjectableInput::from_derive_input(input)?;
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let scope = match input.scope.as_deref() {
        None | Some("singleton") => quote!(::keel::di::Scope::Singleton),
        Some("transient") => quote!(::keel::di::Scope::Transient),
        Some(other) => {
            return Err(darling::Error::custom(format!(
                "unknown scope `{}`, expected \"singleton\" or \"transient\"",
                other
            )));
        }
    };

    let mut hooks = Vec::new();
    if input.on_init {
        hooks.push(quote!(.on_init::<Self>()));
    }
    if input.on_bootstrap {
        hooks.push(quote!(.on_bootstrap::<Self>()));
    }
    if input.on_shutdown {
        hooks.push(quote!(.on_shutdown::<Self>()));
    }

    let fields = match input.data {
        Data::Struct(fields) => fields,
        Data::Enum(_) => return Err(darling::Error::unsupported_shape("enum")),
    };

    let mut dependencies = Vec::new();
    let mut initializers = Vec::new();
    let mut errors = darling::Error::accumulator();
    for field in &fields.fields {
        let name = &field.ident;
        if field.default {
            initializers.push(quote!(#name: ::core::default::Default::default()));
            continue;
        }
        let Some(inner) = arc_inner(&field.ty) else {
            errors.push(
                darling::Error::custom("injected fields must be `Arc<T>` or `Arc<dyn Trait>`; use #[inject(default)] otherwise")
                    .with_span(&field.ty),
            );
            continue;
        };

        let dependency = match &field.token {
            Some(InjectToken(token)) => quote!(::keel::di::Dependency::on::<#inner>().inject(#token)),
            None => quote!(::keel::di::Dependency::on::<#inner>()),
        };
        dependencies.push(dependency);

        let take = match inner {
            Type::TraitObject(_) => quote!(take_dyn),
            _ => quote!(take),
        };
        initializers.push(quote!(#name: deps.#take::<#inner>()?));
    }
    errors.finish()?;

    let construct = match fields.style {
        Style::Unit => quote!(Self),
        _ => quote!(Self { #(#initializers),* }),
    };

    Ok(quote! {
        impl #impl_generics ::keel::di::Injectable for #struct_name #ty_generics #where_clause {
            fn dependencies() -> ::std::vec::Vec<::keel::di::Dependency> {
                ::std::vec![#(#dependencies),*]
            }

            fn scope() -> ::keel::di::Scope {
                #scope
            }

            fn hooks() -> ::keel::lifecycle::LifecycleHooks {
                ::keel::lifecycle::LifecycleHooks::new() #(#hooks)*
            }

            #[allow(unused_variables)]
            fn inject(deps: &mut ::keel::di::Dependencies) -> ::keel::error::DiResult<Self> {
                ::core::result::Result::Ok(#construct)
            }
        }
    })
}

/// Extract the inner type from Arc<T> or Arc<dyn Trait>
fn arc_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Arc" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
