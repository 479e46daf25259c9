use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput};

#[proc_macro_derive(ReflectName)]
pub fn derive_name(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();

    let variant_body = match &input.data {
        Data::Enum(data) => {
            let arms = data.variants.iter().map(|variant| {
                let ident = &variant.ident;
                let ident_str = ident.to_string();
                quote! { Self::#ident { .. } => #ident_str, }
            });
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        _ => quote! { #name_str },
    };

    let expanded = quote! {
        impl #impl_generics ::name_derive::NameReflectable for #name #type_generics #where_clause {
            fn reflect_name() -> &'static str {
                #name_str
            }

            fn variant_name(&self) -> &'static str {
                #variant_body
            }
        }
    };

    TokenStream::from(expanded)
}
