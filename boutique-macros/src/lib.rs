//! Procedural macros for boutique

use darling::ast::NestedMeta;
use darling::{FromAttributes, FromMeta};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, FnArg, ImplItem, ImplItemFn, ItemImpl, ReturnType, Type};

/// Arguments of `#[store_methods(...)]`
#[derive(Debug, Default, FromMeta)]
struct StoreMethodsArgs {
    /// Fields holding base shapes whose methods are inherited
    #[darling(multiple)]
    extends: Vec<String>,
}

/// Method-level `#[handler(...)]` attributes
#[derive(Debug, Default, FromAttributes)]
#[darling(attributes(handler))]
struct HandlerOpts {
    /// Explicit method-table name
    #[darling(default)]
    name: Option<String>,

    /// Leave the method out of the table
    #[darling(default)]
    skip: bool,
}

/// Convert snake_case to lowerCamelCase (`on_login_success` → `onLoginSuccess`)
fn to_lower_camel(s: &str) -> String {
    let s = s.strip_prefix("r#").unwrap_or(s);
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for (i, ch) in s.chars().enumerate() {
        if ch == '_' {
            // Leading underscores are kept, inner ones start a new word
            if out.is_empty() && i == 0 {
                out.push('_');
            } else {
                upper_next = true;
            }
        } else if upper_next && !out.trim_start_matches('_').is_empty() {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
            upper_next = false;
        }
    }
    out
}

/// Whether `ty` is `&StoreCore` (any path ending in `StoreCore`)
fn is_store_ref(ty: &Type) -> bool {
    let Type::Reference(reference) = ty else {
        return false;
    };
    match reference.elem.as_ref() {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "StoreCore"),
        _ => false,
    }
}

/// Build the `.method(...)` registration for one method, or `None` to skip it
fn registration(method: &ImplItemFn) -> syn::Result<Option<TokenStream2>> {
    let opts = HandlerOpts::from_attributes(&method.attrs)
        .map_err(|e| syn::Error::new_spanned(&method.sig, e.to_string()))?;
    if opts.skip {
        return Ok(None);
    }

    let sig = &method.sig;
    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() => {}
        // Associated functions and by-value receivers are not handlers
        _ => return Ok(None),
    }

    let mut args = Vec::new();
    for input in inputs {
        let FnArg::Typed(typed) = input else {
            continue;
        };
        if is_store_ref(&typed.ty) {
            args.push(quote! { store });
        } else {
            args.push(quote! { payload });
        }
    }
    if args.len() > 2 {
        return Err(syn::Error::new_spanned(
            sig,
            "store methods take at most a `&StoreCore` and a `&Payload` after `self`",
        ));
    }
    if !sig.generics.params.is_empty() || sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            sig,
            "store methods cannot be generic or async; mark helpers with #[handler(skip)]",
        ));
    }

    let ident = &sig.ident;
    let name = opts
        .name
        .unwrap_or_else(|| to_lower_camel(&ident.to_string()));
    let call = quote! { Self::#ident(this, #(#args),*) };
    let body = match &sig.output {
        ReturnType::Default => quote! {
            #call;
            ::core::result::Result::Ok(())
        },
        ReturnType::Type(..) => call,
    };

    Ok(Some(quote! {
        .method(
            #name,
            |this: &mut Self, store: &::boutique::StoreCore, payload: &::boutique::Payload| {
                let _ = (&store, &payload);
                #body
            },
        )
    }))
}

/// Generate a `Handlers` implementation from an inherent `impl` block.
///
/// Every method taking `&self` or `&mut self` is registered under its
/// lowerCamelCase name (`on_login` → `onLogin`). After the receiver a method
/// may take a `&StoreCore`, a `&Payload`, both, or neither. Methods returning
/// `()` always succeed; otherwise they must return `HandlerResult`.
///
/// - `#[handler(name = "...")]` registers a method under an explicit name
/// - `#[handler(skip)]` keeps a method out of the table
/// - `#[store_methods(extends = "field")]` inherits the methods of the shape
///   stored in `field`; methods defined here take precedence
///
/// # Example
///
/// ```ignore
/// use boutique::{store_methods, HandlerResult, Payload, StoreCore};
/// use serde_json::json;
///
/// #[derive(Default)]
/// struct Session {
///     logins: u32,
/// }
///
/// #[store_methods]
/// impl Session {
///     fn on_login(&mut self, store: &StoreCore, payload: &Payload) -> HandlerResult {
///         self.logins += 1;
///         store.set_state(json!({ "user": payload }));
///         Ok(())
///     }
///
///     #[handler(name = "logout")]
///     fn clear(&self, store: &StoreCore) {
///         store.set_state(json!({ "user": null }));
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn store_methods(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = match NestedMeta::parse_meta_list(attr.into()) {
        Ok(items) => items,
        Err(e) => return darling::Error::from(e).write_errors().into(),
    };
    let args = match StoreMethodsArgs::from_list(&args) {
        Ok(args) => args,
        Err(e) => return e.write_errors().into(),
    };

    let mut input = parse_macro_input!(item as ItemImpl);
    if let Some((_, path, _)) = &input.trait_ {
        return syn::Error::new_spanned(path, "#[store_methods] expects an inherent impl block")
            .to_compile_error()
            .into();
    }

    let mut registrations = Vec::new();
    for item in &mut input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        match registration(method) {
            Ok(Some(tokens)) => registrations.push(tokens),
            Ok(None) => {}
            Err(e) => return e.to_compile_error().into(),
        }
        method.attrs.retain(|attr| !attr.path().is_ident("handler"));
    }

    let inherits = args.extends.iter().map(|field| {
        let field = format_ident!("{}", field);
        quote! {
            .inherit(
                ::boutique::Handlers::methods(&self.#field),
                |this: &mut Self| &mut this.#field,
            )
        }
    });

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        #input

        impl #impl_generics ::boutique::Handlers for #self_ty #where_clause {
            fn methods(&self) -> ::boutique::Methods<Self> {
                ::boutique::Methods::new()
                    #(#registrations)*
                    #(#inherits)*
            }
        }
    };

    TokenStream::from(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower_camel() {
        assert_eq!(to_lower_camel("on_login"), "onLogin");
        assert_eq!(to_lower_camel("on_login_success"), "onLoginSuccess");
        assert_eq!(to_lower_camel("login"), "login");
        assert_eq!(to_lower_camel("_private_thing"), "_privateThing");
        assert_eq!(to_lower_camel("r#type"), "type");
    }

    #[test]
    fn test_is_store_ref() {
        let ty: Type = syn::parse_quote!(&StoreCore);
        assert!(is_store_ref(&ty));
        let ty: Type = syn::parse_quote!(&boutique::StoreCore);
        assert!(is_store_ref(&ty));
        let ty: Type = syn::parse_quote!(&Payload);
        assert!(!is_store_ref(&ty));
        let ty: Type = syn::parse_quote!(StoreCore);
        assert!(!is_store_ref(&ty));
    }

    #[test]
    fn test_registration_skips_non_handlers() {
        let method: ImplItemFn = syn::parse_quote! {
            #[handler(skip)]
            fn helper(&self) -> u32 { 1 }
        };
        assert!(registration(&method).unwrap().is_none());

        let method: ImplItemFn = syn::parse_quote! {
            fn new() -> Self { Self }
        };
        assert!(registration(&method).unwrap().is_none());
    }

    #[test]
    fn test_registration_rejects_extra_params() {
        let method: ImplItemFn = syn::parse_quote! {
            fn on_login(&mut self, store: &StoreCore, payload: &Payload, extra: u8) {}
        };
        assert!(registration(&method).is_err());
    }

    #[test]
    fn test_registration_uses_explicit_name() {
        let method: ImplItemFn = syn::parse_quote! {
            #[handler(name = "logout")]
            fn clear(&self, store: &StoreCore) {}
        };
        let tokens = registration(&method).unwrap().unwrap().to_string();
        assert!(tokens.contains("\"logout\""));
        assert!(tokens.contains("clear"));
        assert!(!tokens.contains("on_login"));
    }
}
