use proc_macro::TokenStream;
use quote::quote;
use syn::{
    punctuated::Punctuated, token::Comma, ExprClosure, FnArg, Pat, PatType, Path, PathArguments,
    PathSegment, TypePath,
};

/// Turn an async test into a blocking `#[test]` that runs against a live
/// hellogae server and a mocked platform.
///
/// The test takes one `TestingTools` argument, destructured however it likes.
/// Before the server starts, an optional closure can change the
/// `TestConfig` it receives as `config`:
///
/// - `config.deployment` picks local or managed mode, as the bootstrapper
///   would have. Managed is the default.
/// - `config.serve_platform` set to false leaves the platform mock empty, so
///   every metadata and service call fails unless the test mocks it.
/// - `config.bridge_delay` slows down every service bridge answer.
/// - `config.settings` holds the server settings, such as the entry point.
///
/// Any other closure parameter must be typed, `name: Type`, and becomes an
/// argument of the generated function. That is how `parameterized` cases
/// reach the closure. Put the `parameterized` attribute below this one.
///
/// # Example:
///
/// Basic usage:
///
/// ```
/// use hellogae_integration_tests::{hellogae_test_macro, TestingTools};
///
/// #[hellogae_test_macro]
/// async fn test_function(TestingTools { test_client, .. }: TestingTools) {
///     // test using test_client
/// }
/// ```
///
/// The configuration can be customized:
///
/// ```
/// use hellogae_integration_tests::{hellogae_test_macro, TestingTools};
/// use hellogae_web::DeploymentMode;
///
/// #[hellogae_test_macro(|config| config.deployment = DeploymentMode::Local)]
/// async fn test_function(TestingTools { test_client, .. }: TestingTools) {
///     // test using test_client against a server that runs in local mode.
/// }
/// ```
///
/// Other test macros, like `parameterized`, can be used:
///
/// ```
/// use hellogae_integration_tests::{TestingTools, hellogae_test_macro};
/// use hellogae_web::DeploymentMode;
/// use parameterized::parameterized;
///
/// #[hellogae_test_macro(|config, mode: DeploymentMode| config.deployment = mode)]
/// #[parameterized(mode = { DeploymentMode::Local, DeploymentMode::Managed })]
/// async fn test(TestingTools { .. }: TestingTools) {
///     // test will run twice, once in each deployment mode.
/// }
/// ```
///
#[proc_macro_attribute]
pub fn hellogae_test(attributes: TokenStream, item: TokenStream) -> TokenStream {
    // Parse the function that this macro is attached to.
    let mut input = syn::parse_macro_input!(item as syn::ItemFn);
    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &mut input.sig;
    let body = &input.block;

    // If the function doesn't have a #[test] attribute, we'll probably need to provide one.
    let has_test_attr = attrs.iter().any(|attr| attr.path().is_ident("test"));

    // Check for the library parameterized, which unconditionally adds
    // `#[test]`.
    let is_parameterized = attrs.iter().any(|attr| {
        let segment_names: Vec<_> = attr
            .path()
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        (segment_names == vec!["parameterized"])
            || (segment_names == vec!["parameterized", "parameterized"])
    });

    // If parameterized is not being used and there is no test attribute already
    // present, add one.
    let missing_test_attr = if has_test_attr || is_parameterized {
        quote!()
    } else {
        quote!(#[test])
    };

    // Check that function is async. Then remove `async` from the signature, so
    // we can reuse the same signature for our blocking sync outer function.
    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            sig.fn_token,
            "the async keyword is missing from the function declaration",
        )
        .to_compile_error()
        .into();
    }
    sig.asyncness = None;

    // Find and take the `TestingTools` arg, leaving any others in place. This
    // has the pattern match that defines the bindings the caller is expecting
    // to use, so we have to use it directly.
    let original_args = sig.inputs.clone();
    let mut toplevel_args = Punctuated::<FnArg, Comma>::new();
    let mut testing_tools_arg = None;

    for arg in &original_args {
        match arg {
            FnArg::Receiver(_) => toplevel_args.push(arg.clone()),
            FnArg::Typed(PatType { ty, pat, .. }) => match &**ty {
                syn::Type::Path(TypePath {
                    qself: None,
                    path:
                        Path {
                            leading_colon: None,
                            segments,
                        },
                }) => match segments.last() {
                    Some(PathSegment {
                        arguments: PathArguments::None,
                        ident,
                    }) if *ident == "TestingTools" => {
                        testing_tools_arg = Some(pat.clone());
                    }
                    _ => toplevel_args.push(arg.clone()),
                },
                _ => toplevel_args.push(arg.clone()),
            },
        }
    }

    let testing_tools_pat = match testing_tools_arg {
        Some(pat) => pat,
        None => {
            return syn::Error::new_spanned(
                original_args,
                "expected an argument of type TestingTools",
            )
            .into_compile_error()
            .into()
        }
    };

    // The config closure in the macro invocation can also contribute
    // arguments. These arguments can be used by other macros like
    // parameterized.
    let config_changer = if attributes.is_empty() {
        quote!(|_config: &mut ::hellogae_integration_tests::TestConfig| {})
    } else {
        let config_closure = syn::parse_macro_input!(attributes as ExprClosure);
        for arg in config_closure.inputs {
            match arg {
                Pat::Ident(pat) if pat.ident == "config" => (),
                Pat::Type(pat) => toplevel_args.push(FnArg::Typed(pat)),
                _ => {
                    return syn::Error::new_spanned(
                        arg,
                        "only `config` and `val: Type` parameters can be used for hellogae_test inputs",
                    )
                    .into_compile_error()
                    .into()
                }
            }
        }
        let closure_body = config_closure.body;
        quote!(|config: &mut ::hellogae_integration_tests::TestConfig| { #closure_body })
    };

    // Add all collected arguments to the top level signature.
    sig.inputs = toplevel_args;

    // output the built test function

    (quote! {
        #(#attrs)*
        #missing_test_attr
        #vis #sig {
            actix_rt::System::new()
                .block_on(async {
                    ::hellogae_integration_tests::hellogae_test(
                        #config_changer,
                        |#testing_tools_pat: ::hellogae_integration_tests::TestingTools| async move #body
                    ).await
                })
        }
    })
    .into()
}
