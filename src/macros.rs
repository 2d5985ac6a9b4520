//! Declarative helpers for wire-level enums and error code tables.

/// Defines named numeric error codes together with a lookup for their messages.
macro_rules! define_error_codes {
    ($($name:ident = $code:literal => $msg:literal),* $(,)?) => {
        $(pub const $name: i64 = $code;)*

        /// Returns a human readable message for a known error code.
        pub fn get_error_message(code: i64) -> &'static str {
            match code {
                $($code => $msg,)*
                _ => "Unknown error",
            }
        }
    };
}

/// Defines a closed string enum mirroring identifiers used on the wire.
///
/// Generates `as_str`, `from_wire`, `ALL`, `Display`, `FromStr` and serde impls
/// that read and write the wire string.
macro_rules! define_wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $wire:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),*
                }
            }

            pub fn from_wire(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::SonoffError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Self::from_wire(s).ok_or_else(|| {
                    $crate::error::SonoffError::InvalidArgument(format!(
                        "Unknown {} value: {}",
                        stringify!($name),
                        s
                    ))
                })
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_wire(&s).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown {} value: {}", stringify!($name), s))
                })
            }
        }
    };
}
