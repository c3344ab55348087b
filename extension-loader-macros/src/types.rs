use quote::ToTokens;

/////////////////////////////////////////////////////////////////////////////////////////

/// How one `new()` parameter should be supplied when a `#[named]`/
/// `#[wrapper]` factory builds its instance. Mirrors `dill-impl`'s
/// `InjectionType`, narrowed to the shapes this loader actually injects:
/// trait-object dependencies (required or optional) and plain values.
pub(crate) enum InjectionKind {
    /// `Arc<dyn Iface>`: required dependency, resolved via `Injector`.
    Required { iface: syn::Type },
    /// `Option<Arc<dyn Iface>>`: optional dependency; `None` on a missed
    /// resolution, matching the "skip on null" rule.
    Optional { iface: syn::Type },
    /// Anything else: built with `Default::default()`.
    Value { typ: syn::Type },
}

pub(crate) fn deduce_injection_kind(typ: &syn::Type) -> InjectionKind {
    if let Some(iface) = arc_dyn_inner(typ) {
        return InjectionKind::Required { iface };
    }
    if let Some(inner) = option_inner(typ) {
        if let Some(iface) = arc_dyn_inner(&inner) {
            return InjectionKind::Optional { iface };
        }
    }
    InjectionKind::Value { typ: typ.clone() }
}

/////////////////////////////////////////////////////////////////////////////////////////

/// If `typ` is `Arc<dyn Iface>` (or `Arc<dyn Iface + Send + Sync>`),
/// returns the `dyn Iface...` type inside. `Iface` is left exactly as
/// written so supertrait bounds the caller wrote are preserved.
pub(crate) fn arc_dyn_inner(typ: &syn::Type) -> Option<syn::Type> {
    let inner = single_generic_arg(typ, "Arc")?;
    matches!(inner, syn::Type::TraitObject(_)).then_some(inner)
}

fn option_inner(typ: &syn::Type) -> Option<syn::Type> {
    single_generic_arg(typ, "Option")
}

fn single_generic_arg(typ: &syn::Type, ident: &str) -> Option<syn::Type> {
    let syn::Type::Path(type_path) = typ else {
        return None;
    };
    if type_path.qself.is_some() {
        return None;
    }
    let segment = type_path.path.segments.last()?;
    if segment.ident != ident {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    syn::parse2(args.args.to_token_stream()).ok()
}

/////////////////////////////////////////////////////////////////////////////////////////

/// `true` for `Url` or `&Url` written literally (§4.5 step 2, the direct
/// case handled through `ExtractUrl` rather than `HasUrl`).
pub(crate) fn is_url_type(typ: &syn::Type) -> bool {
    let stripped = match typ {
        syn::Type::Reference(r) => r.elem.as_ref(),
        other => other,
    };
    matches!(stripped, syn::Type::Path(p) if p.qself.is_none() && p.path.is_ident("Url"))
}

/// `true` for a type written as `&dyn Invocation` (the only shape the
/// `#[adaptive]` codegen looks for when wiring method-scoped URL lookups).
pub(crate) fn is_invocation_type(typ: &syn::Type) -> bool {
    let syn::Type::Reference(r) = typ else {
        return false;
    };
    matches!(r.elem.as_ref(), syn::Type::TraitObject(t)
        if t.bounds.iter().any(|b| matches!(b, syn::TypeParamBound::Trait(tb) if tb.path.is_ident("Invocation"))))
}
