extern crate proc_macro;

mod types;

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use types::{arc_dyn_inner, deduce_injection_kind, is_invocation_type, is_url_type, InjectionKind};

/////////////////////////////////////////////////////////////////////////////////////////

/// Turns a trait into an extension point (§3, §4.5, §4.6). Methods carrying
/// `#[adaptive]`/`#[adaptive(keys = "k1,k2")]` get a generated dispatch body
/// on a companion `<Trait>Adaptive` struct; methods without it compile to
/// `Err(ExtensionError::unsupported_operation(...))`. A trait with no
/// `#[adaptive]` method is a macro-time error (§4.5 step 1/§7
/// `NoAdaptiveMethod`, caught at compile time rather than on first call).
#[proc_macro_attribute]
pub fn extension_point(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_attr_args(attr);
    let default_name = args
        .get("default")
        .cloned()
        .unwrap_or_default();

    let mut item_trait: syn::ItemTrait = syn::parse(item).expect("#[extension_point] expects a trait");
    let trait_ident = item_trait.ident.clone();
    let trait_name_str = trait_ident.to_string();
    let adaptive_ident = format_ident!("{trait_ident}Adaptive");

    let mut adaptive_methods = Vec::new();
    let mut plain_methods = Vec::new();

    for item in &mut item_trait.items {
        let syn::TraitItem::Fn(method) = item else {
            continue;
        };
        if let Some(keys) = take_adaptive_attr(&mut method.attrs) {
            adaptive_methods.push((method.clone(), keys));
        } else {
            plain_methods.push(method.clone());
        }
        // `#[url]`/`#[invocation]` are markers this crate consumes while
        // building the generated dispatch body (from the clones above);
        // the trait definition the compiler actually sees must not carry
        // them, since a plain `#[proc_macro_attribute]` has no declared
        // helper attributes to silently absorb.
        for input in &mut method.sig.inputs {
            if let syn::FnArg::Typed(pat_type) = input {
                pat_type.attrs.retain(|a| !a.path().is_ident("url") && !a.path().is_ident("invocation"));
            }
        }
    }

    if adaptive_methods.is_empty() {
        panic!(
            "#[extension_point] on {trait_name_str} has no #[adaptive] method; an adaptive \
             extension point needs at least one method to dispatch through"
        );
    }

    let default_key = default_dispatch_key(&trait_name_str);

    let adaptive_impls = adaptive_methods.iter().map(|(method, keys)| {
        generate_adaptive_method(&trait_ident, &trait_name_str, method, keys, &default_key, &default_name)
    });
    let unsupported_impls = plain_methods
        .iter()
        .map(|method| generate_unsupported_method(&trait_name_str, method));

    let resolver_fn = format_ident!("__resolve_{}", trait_ident.to_string().to_lowercase());

    let default_name_registration = (!default_name.is_empty()).then(|| {
        let register_fn = format_ident!("__register_default_{}", trait_ident.to_string().to_lowercase());
        quote! {
            fn #register_fn(
                any: &mut dyn ::std::any::Any,
            ) -> ::std::result::Result<(), ::extension_loader::ExtensionError> {
                let builder = ::extension_loader::class_registry::downcast_builder::<dyn #trait_ident>(any);
                builder.set_default_name(#default_name);
                ::std::result::Result::Ok(())
            }

            ::extension_loader::inventory::submit! {
                ::extension_loader::Registration {
                    interface: ::std::any::TypeId::of::<dyn #trait_ident>(),
                    register: #register_fn,
                }
            }
        }
    });

    let expanded = quote! {
        #item_trait

        #[doc = "Generated adaptive dispatcher; resolves a concrete extension by URL on every call."]
        pub struct #adaptive_ident {
            factory: ::std::sync::Arc<dyn ::extension_loader::Injector>,
        }

        impl #adaptive_ident {
            pub fn new() -> Self {
                Self::with_factory(::std::sync::Arc::new(
                    ::extension_loader::CompositeExtensionFactory::with_defaults(::std::vec::Vec::new()),
                ))
            }

            pub fn with_factory(factory: ::std::sync::Arc<dyn ::extension_loader::Injector>) -> Self {
                Self { factory }
            }

            fn extension_point() -> ::std::sync::Arc<::extension_loader::ExtensionPoint<dyn #trait_ident>> {
                ::extension_loader::registry::get::<dyn #trait_ident>(#trait_name_str)
            }
        }

        impl ::std::default::Default for #adaptive_ident {
            fn default() -> Self {
                Self::new()
            }
        }

        impl #trait_ident for #adaptive_ident {
            #( #adaptive_impls )*
            #( #unsupported_impls )*
        }

        fn #resolver_fn(
            property: &str,
            injector: &dyn ::extension_loader::Injector,
        ) -> ::std::option::Option<::std::sync::Arc<dyn ::std::any::Any + ::std::marker::Send + ::std::marker::Sync>> {
            let ext = #adaptive_ident::extension_point().get(property, injector).ok()?;
            ::std::option::Option::Some(::extension_loader::erase(ext))
        }

        ::extension_loader::inventory::submit! {
            ::extension_loader::FactoryResolver {
                interface: ::std::any::TypeId::of::<dyn #trait_ident>(),
                resolve: #resolver_fn,
            }
        }

        #default_name_registration
    };

    expanded.into()
}

/////////////////////////////////////////////////////////////////////////////////////////

fn generate_adaptive_method(
    trait_ident: &syn::Ident,
    trait_name_str: &str,
    method: &syn::TraitItemFn,
    keys: &[String],
    default_key: &str,
    default_name: &str,
) -> proc_macro2::TokenStream {
    let sig = &method.sig;
    let method_ident = &sig.ident;
    let method_name_str = method_ident.to_string();

    let keys: Vec<&str> = if keys.is_empty() {
        vec![default_key]
    } else {
        keys.iter().map(String::as_str).collect()
    };

    let mut url_expr = None;
    let mut has_invocation = false;

    for input in &sig.inputs {
        let syn::FnArg::Typed(pat_type) = input else {
            continue;
        };
        let syn::Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            continue;
        };
        let name = &pat_ident.ident;

        if is_url_type(&pat_type.ty) {
            url_expr = Some(quote! {
                ::extension_loader::ExtractUrl::extract_url(&#name)
            });
        } else if has_attr(&pat_type.attrs, "url") {
            url_expr = Some(quote! {
                ::std::option::Option::Some(::extension_loader::HasUrl::url(&#name))
            });
        } else if is_invocation_type(&pat_type.ty) || has_attr(&pat_type.attrs, "invocation") {
            has_invocation = true;
        }
    }

    let url_expr = url_expr.unwrap_or_else(|| quote! { ::std::option::Option::None });

    let method_arg_names: Vec<_> = sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            syn::FnArg::Typed(pt) => match pt.pat.as_ref() {
                syn::Pat::Ident(ident) => Some(ident.ident.clone()),
                _ => None,
            },
            syn::FnArg::Receiver(_) => None,
        })
        .collect();

    let method_name_for_lookup = if has_invocation {
        quote! { ::std::option::Option::Some(#method_name_str) }
    } else {
        quote! { ::std::option::Option::None }
    };

    let clean_sig = signature_without_param_attrs(sig);

    quote! {
        #clean_sig {
            let __url = (#url_expr).ok_or_else(|| ::extension_loader::ExtensionError::NoUrlInCall {
                interface: #trait_name_str,
                method: #method_name_str,
            })?;
            let __name = ::extension_loader::resolve_extension_name(
                __url,
                #method_name_for_lookup,
                &[#( #keys ),*],
                #default_name,
                #trait_name_str,
            )?;
            let __ext = #trait_ident::extension_point().get(&__name, self.factory.as_ref())?;
            __ext.#method_ident(#( #method_arg_names ),*)
        }
    }
}

fn generate_unsupported_method(trait_name_str: &str, method: &syn::TraitItemFn) -> proc_macro2::TokenStream {
    let clean_sig = signature_without_param_attrs(&method.sig);
    let method_name_str = method.sig.ident.to_string();
    quote! {
        #clean_sig {
            ::std::result::Result::Err(::extension_loader::ExtensionError::unsupported_operation(
                #trait_name_str,
                #method_name_str,
            ))
        }
    }
}

/// Re-emits a method signature with parameter attributes (`#[url]`,
/// `#[invocation]`) stripped — they are inert markers this crate consumes
/// at macro-expansion time, not real attributes the compiler should see.
fn signature_without_param_attrs(sig: &syn::Signature) -> syn::Signature {
    let mut sig = sig.clone();
    for input in &mut sig.inputs {
        if let syn::FnArg::Typed(pat_type) = input {
            pat_type.attrs.clear();
        }
    }
    sig
}

fn has_attr(attrs: &[syn::Attribute], ident: &str) -> bool {
    attrs.iter().any(|a| a.path().is_ident(ident))
}

/// Strips and returns `#[adaptive]`/`#[adaptive(keys = "a,b")]` from a
/// method's attributes, or `None` if absent.
fn take_adaptive_attr(attrs: &mut Vec<syn::Attribute>) -> Option<Vec<String>> {
    let index = attrs.iter().position(|a| a.path().is_ident("adaptive"))?;
    let attr = attrs.remove(index);

    let mut keys = Vec::new();
    if matches!(attr.meta, syn::Meta::List(_)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("keys") {
                let value: syn::LitStr = meta.value()?.parse()?;
                keys = value
                    .value()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect();
            }
            Ok(())
        })
        .expect("failed to parse #[adaptive(...)] arguments");
    }
    Some(keys)
}

/// Derives the default dispatch key for a trait with no explicit `keys`
/// (§4.5 bullet 4): CamelCase split on word boundaries, dot-joined,
/// lower-cased.
fn default_dispatch_key(trait_name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in trait_name.char_indices() {
        if i > 0 && ch.is_uppercase() {
            out.push('.');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/////////////////////////////////////////////////////////////////////////////////////////

/// Registers a no-argument-constructible implementation (§3 "Named
/// class"). Placed on the struct's own inherent `impl Struct { fn new(...)
/// -> Self { ... } }` block, mirroring the `#[component] impl AImpl { fn
/// new(...) }` mode `dill-impl` itself supports (`dill`'s test suite uses
/// it alongside the struct-annotated mode): the trait `impl Trait for
/// Struct` this factory is bound to is written as a separate, ordinary
/// impl block the macro never touches, since `new` is not itself a trait
/// method and so cannot live in a trait impl. `interface = "Trait"` names
/// which extension point trait to register against.
#[proc_macro_attribute]
pub fn named(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_attr_args(attr);
    let names = split_list(args.get("names").map(String::as_str).unwrap_or(""));
    if names.is_empty() {
        panic!("#[named(names = \"...\")] requires at least one name");
    }
    let trait_ident = interface_ident(&args, "named");
    let activate = activate_spec_tokens(&args);

    let item_impl: syn::ItemImpl = syn::parse(item)
        .expect("#[named] expects an inherent `impl Type { .. }` block");
    if item_impl.trait_.is_some() {
        panic!(
            "#[named] expects an inherent impl block (`impl Type { fn new(...) }`), not a \
             trait impl; write `impl Trait for Type` separately"
        );
    }
    let impl_type = (*item_impl.self_ty).clone();
    let new_fn = find_new(&item_impl).expect(
        "#[named] requires the impl block to contain a fn new(...) -> Self constructor",
    );

    let factory_ident = format_ident!("{}Factory", type_ident_name(&impl_type));
    let register_fn = format_ident!("__register_{}", type_ident_name(&impl_type).to_lowercase());

    let (prepare, ctor_args) = build_constructor_args(new_fn, &impl_type);

    let activate_override = activate.map(|spec| {
        quote! {
            fn activate(&self) -> ::std::option::Option<&::extension_loader::ActivateSpec> {
                static SPEC: ::extension_loader::ActivateSpec = #spec;
                ::std::option::Option::Some(&SPEC)
            }
        }
    });

    let expanded = quote! {
        #item_impl

        #[doc(hidden)]
        pub struct #factory_ident;

        impl ::extension_loader::NamedFactory<dyn #trait_ident> for #factory_ident {
            fn names(&self) -> &'static [&'static str] {
                &[#( #names ),*]
            }

            fn type_name(&self) -> &'static str {
                ::std::any::type_name::<#impl_type>()
            }

            fn concrete_type_id(&self) -> ::std::any::TypeId {
                ::std::any::TypeId::of::<#impl_type>()
            }

            fn create(
                &self,
                injector: &dyn ::extension_loader::Injector,
            ) -> ::std::result::Result<::std::sync::Arc<dyn #trait_ident>, ::extension_loader::ExtensionError> {
                #( #prepare )*
                ::std::result::Result::Ok(::std::sync::Arc::new(#impl_type::new(#( #ctor_args ),*)))
            }

            #activate_override
        }

        fn #register_fn(
            any: &mut dyn ::std::any::Any,
        ) -> ::std::result::Result<(), ::extension_loader::ExtensionError> {
            let builder = ::extension_loader::class_registry::downcast_builder::<dyn #trait_ident>(any);
            builder.add_named(::std::sync::Arc::new(#factory_ident), stringify!(#trait_ident))
        }

        ::extension_loader::inventory::submit! {
            ::extension_loader::Registration {
                interface: ::std::any::TypeId::of::<dyn #trait_ident>(),
                register: #register_fn,
            }
        }
    };

    expanded.into()
}

/////////////////////////////////////////////////////////////////////////////////////////

/// Registers a single-argument decorator (§3 "Wrapper class"). Like
/// `#[named]`, placed on the struct's own inherent `impl Struct { fn
/// new(...) -> Self }` block, never on a trait impl; whichever `new`
/// parameter is typed `Arc<dyn Trait>` (the trait named by `interface =
/// "Trait"`) receives the inner instance being wrapped, and every other
/// parameter is injected exactly as in `#[named]`.
#[proc_macro_attribute]
pub fn wrapper(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_attr_args(attr);
    let trait_ident = interface_ident(&args, "wrapper");

    let item_impl: syn::ItemImpl = syn::parse(item)
        .expect("#[wrapper] expects an inherent `impl Type { .. }` block");
    if item_impl.trait_.is_some() {
        panic!(
            "#[wrapper] expects an inherent impl block (`impl Type { fn new(...) }`), not a \
             trait impl; write `impl Trait for Type` separately"
        );
    }
    let impl_type = (*item_impl.self_ty).clone();
    let new_fn = find_new(&item_impl)
        .expect("#[wrapper] requires the impl block to contain a fn new(...) -> Self constructor");

    let factory_ident = format_ident!("{}Factory", type_ident_name(&impl_type));
    let register_fn = format_ident!("__register_{}", type_ident_name(&impl_type).to_lowercase());

    let inner_param = new_fn
        .sig
        .inputs
        .iter()
        .find_map(|input| match input {
            syn::FnArg::Typed(pt) => {
                let iface = arc_dyn_inner(&pt.ty)?;
                let is_same_trait = matches!(&iface, syn::Type::TraitObject(t)
                    if t.bounds.iter().any(|b| matches!(b, syn::TypeParamBound::Trait(tb) if tb.path.is_ident(&trait_ident))));
                is_same_trait.then(|| match pt.pat.as_ref() {
                    syn::Pat::Ident(ident) => ident.ident.clone(),
                    _ => panic!("unexpected pattern in wrapper constructor"),
                })
            }
            syn::FnArg::Receiver(_) => None,
        })
        .expect("#[wrapper]'s constructor needs one parameter typed Arc<dyn Trait> for the wrapped instance");

    let (prepare, ctor_args) = build_constructor_args_with_override(new_fn, &impl_type, &inner_param, quote! { inner });

    let expanded = quote! {
        #item_impl

        #[doc(hidden)]
        pub struct #factory_ident;

        impl ::extension_loader::WrapperFactory<dyn #trait_ident> for #factory_ident {
            fn type_name(&self) -> &'static str {
                ::std::any::type_name::<#impl_type>()
            }

            fn wrap(
                &self,
                inner: ::std::sync::Arc<dyn #trait_ident>,
                injector: &dyn ::extension_loader::Injector,
            ) -> ::std::result::Result<::std::sync::Arc<dyn #trait_ident>, ::extension_loader::ExtensionError> {
                #( #prepare )*
                ::std::result::Result::Ok(::std::sync::Arc::new(#impl_type::new(#( #ctor_args ),*)))
            }
        }

        fn #register_fn(
            any: &mut dyn ::std::any::Any,
        ) -> ::std::result::Result<(), ::extension_loader::ExtensionError> {
            let builder = ::extension_loader::class_registry::downcast_builder::<dyn #trait_ident>(any);
            builder.add_wrapper(::std::sync::Arc::new(#factory_ident));
            ::std::result::Result::Ok(())
        }

        ::extension_loader::inventory::submit! {
            ::extension_loader::Registration {
                interface: ::std::any::TypeId::of::<dyn #trait_ident>(),
                register: #register_fn,
            }
        }
    };

    expanded.into()
}

/////////////////////////////////////////////////////////////////////////////////////////

fn build_constructor_args(
    new_fn: &syn::ImplItemFn,
    impl_type: &syn::Type,
) -> (Vec<proc_macro2::TokenStream>, Vec<syn::Ident>) {
    build_constructor_args_with_override(new_fn, impl_type, &syn::Ident::new("__never__", proc_macro2::Span::call_site()), quote! {})
}

fn build_constructor_args_with_override(
    new_fn: &syn::ImplItemFn,
    impl_type: &syn::Type,
    override_param: &syn::Ident,
    override_expr: proc_macro2::TokenStream,
) -> (Vec<proc_macro2::TokenStream>, Vec<syn::Ident>) {
    let mut prepare = Vec::new();
    let mut names = Vec::new();

    for input in &new_fn.sig.inputs {
        let syn::FnArg::Typed(pat_type) = input else {
            continue;
        };
        let syn::Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            panic!("unexpected pattern in {}::new()'s parameters", quote! { #impl_type })
        };
        let name = &pat_ident.ident;
        names.push(name.clone());

        if name == override_param {
            prepare.push(quote! { let #name = #override_expr; });
            continue;
        }

        match deduce_injection_kind(&pat_type.ty) {
            InjectionKind::Required { iface } => {
                let name_str = name.to_string();
                prepare.push(quote! {
                    let #name = ::extension_loader::InjectorExt::resolve::<#iface>(injector, #name_str)
                        .ok_or_else(|| ::extension_loader::ExtensionError::InstantiationFailed {
                            type_name: ::std::any::type_name::<#impl_type>(),
                            reason: ::std::format!("missing required dependency \"{}\"", #name_str),
                        })?;
                });
            }
            InjectionKind::Optional { iface } => {
                let name_str = name.to_string();
                prepare.push(quote! {
                    let #name = ::extension_loader::InjectorExt::resolve::<#iface>(injector, #name_str);
                });
            }
            InjectionKind::Value { .. } => {
                prepare.push(quote! { let #name = ::std::default::Default::default(); });
            }
        }
    }

    (prepare, names)
}

/////////////////////////////////////////////////////////////////////////////////////////

/// Reads the `interface = "Trait"` argument naming which extension point
/// trait a `#[named]`/`#[wrapper]` registration is for (required, since an
/// inherent impl block carries no trait path of its own to read it off).
fn interface_ident(args: &std::collections::HashMap<String, String>, macro_name: &str) -> syn::Ident {
    let raw = args.get("interface").unwrap_or_else(|| {
        panic!(
            "#[{macro_name}(...)] requires interface = \"Trait\" naming the extension point trait"
        )
    });
    format_ident!("{}", raw)
}

fn find_new(item_impl: &syn::ItemImpl) -> Option<&syn::ImplItemFn> {
    item_impl.items.iter().find_map(|item| match item {
        syn::ImplItem::Fn(f) if f.sig.ident == "new" => Some(f),
        _ => None,
    })
}

fn type_ident_name(typ: &syn::Type) -> String {
    let syn::Type::Path(p) = typ else {
        panic!("expected a plain type path");
    };
    p.path
        .segments
        .last()
        .expect("empty type path")
        .ident
        .to_string()
}

/// Parses a flat `key = "value", key2 = 1` attribute argument list into a
/// string map; numeric/bare-word values are stringified as-is.
fn parse_attr_args(attr: TokenStream) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    if attr.is_empty() {
        return map;
    }
    let parser = syn::meta::parser(|meta| {
        let key = meta
            .path
            .get_ident()
            .map(ToString::to_string)
            .unwrap_or_default();
        let value = if let Ok(lit) = meta.value().and_then(|v| v.parse::<syn::LitStr>()) {
            lit.value()
        } else if let Ok(lit) = meta.value().and_then(|v| v.parse::<syn::LitInt>()) {
            lit.base10_digits().to_owned()
        } else {
            String::new()
        };
        map.insert(key, value);
        Ok(())
    });
    syn::parse::Parser::parse(parser, attr).expect("failed to parse attribute arguments");
    map
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn activate_spec_tokens(args: &std::collections::HashMap<String, String>) -> Option<proc_macro2::TokenStream> {
    let has_any = ["group", "value", "order", "before", "after"]
        .iter()
        .any(|k| args.contains_key(*k));
    if !has_any {
        return None;
    }
    let group = split_list(args.get("group").map(String::as_str).unwrap_or(""));
    let value = split_list(args.get("value").map(String::as_str).unwrap_or(""));
    let before = split_list(args.get("before").map(String::as_str).unwrap_or(""));
    let after = split_list(args.get("after").map(String::as_str).unwrap_or(""));
    let order: i32 = args
        .get("order")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    Some(quote! {
        ::extension_loader::ActivateSpec {
            group: &[#( #group ),*],
            value: &[#( #value ),*],
            order: #order,
            before: &[#( #before ),*],
            after: &[#( #after ),*],
        }
    })
}
