pub trait NameReflectable {
    fn reflect_name() -> &'static str;

    /// Name of the variant held by `self`; the type name for structs.
    fn variant_name(&self) -> &'static str;
}

pub use name_derive_macro::ReflectName;
