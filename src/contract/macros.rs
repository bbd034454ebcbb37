//! Declarative contract macro.

/// Declare a capability contract and its typed accessor trait.
///
/// ```
/// capconf::contract! {
///     /// Feature switches read from `flags.properties`.
///     pub struct FeatureFlags: FeatureFlagsConfig from "flags.properties" {
///         fn flag() -> bool = ("f", "false");
///         fn retries() -> i32 = ("net.retries", "3");
///     }
/// }
/// ```
///
/// This expands to a unit struct implementing [`Contract`](crate::Contract)
/// and a trait (`FeatureFlagsConfig`) implemented for
/// `Capability<FeatureFlags>`, so an instance answers `caps.flag()`.
///
/// Accessor return types must implement [`FromScalar`](crate::FromScalar):
/// `String`, `bool`, `i32`, `i64`, `f64`, `f32`, `i16`, `char` or `i8`.
#[macro_export]
macro_rules! contract {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $access:ident from $source:literal {
            $(
                $(#[$ameta:meta])*
                fn $method:ident() -> $ty:ty = ($key:literal, $default:literal);
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::Contract for $name {
            fn declaration() -> $crate::ContractDecl {
                $crate::ContractDecl::capability(stringify!($name), $source)
                    $(
                        .accessor(
                            $crate::AccessorDecl::new(stringify!($method), stringify!($ty))
                                .key($key)
                                .default_value($default),
                        )
                    )*
            }
        }

        $vis trait $access {
            $(
                $(#[$ameta])*
                fn $method(&self) -> $ty;
            )*
        }

        impl $access for $crate::Capability<$name> {
            $(
                fn $method(&self) -> $ty {
                    self.value::<$ty>(stringify!($method))
                }
            )*
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{Contract, ScalarKind};

    crate::contract! {
        struct Sample: SampleConfig from "@SAMPLE_PATH@" {
            /// Whether the sample is on.
            fn enabled() -> bool = ("sample.enabled", "true");
            fn label() -> String = ("sample.label", "none");
            fn ratio() -> f64 = ("sample.ratio", "0.5");
        }
    }

    #[test]
    fn test_declaration_from_macro() {
        let decl = Sample::declaration();
        assert_eq!(decl.type_name, "Sample");
        assert_eq!(decl.source.as_deref(), Some("@SAMPLE_PATH@"));
        assert_eq!(decl.accessors.len(), 3);

        let descriptor = decl.validate().unwrap();
        assert_eq!(descriptor.accessors[0].key, "sample.enabled");
        assert_eq!(descriptor.accessors[1].kind, ScalarKind::String);
        assert_eq!(descriptor.accessors[2].default_value, "0.5");
    }
}
