//! # Wire Conversion
//!
//! Purpose: Turn command arguments into the text sent to the server, and
//! response text back into the types callers ask for.
//!
//! ## Design Principles
//! 1. **Locale-Free Text**: Scalars use Rust's `Display`/`FromStr`, which never
//!    depend on locale.
//! 2. **Report, Don't Abort**: A failed conversion is logged and falls back to
//!    an empty string (arguments) or the target's default (results).
//! 3. **Truthiness Is Special**: `bool` follows the server's conventions, not
//!    `FromStr` (see [`truthy`]).
//!
//! ## Round-Trips
//! `from_wire::<T>(&to_wire(&v)) == v` holds for strings, `char`, `bool` and
//! every integer type. Floats round-trip except `NaN`, which never compares
//! equal to itself. Byte slices have no inverse.

use std::borrow::Cow;

use kvwrap_common::{NIL, OK};
use tracing::warn;

use crate::error::ConversionError;

/// A value that can be sent as one command argument.
pub trait ToWire {
    /// Converts the value into its wire text.
    fn try_to_wire(&self) -> Result<String, ConversionError>;
}

/// A type a response payload can be converted into.
pub trait FromWire: Sized {
    /// Parses wire text into `Self`.
    fn try_from_wire(text: &str) -> Result<Self, ConversionError>;
}

/// Converts an argument to wire text, sending an empty string on failure.
pub fn to_wire<T: ToWire + ?Sized>(value: &T) -> String {
    match value.try_to_wire() {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "argument conversion failed; sending empty string");
            String::new()
        }
    }
}

/// Converts wire text to `T`, returning `T::default()` on failure.
pub fn from_wire<T: FromWire + Default>(text: &str) -> T {
    match T::try_from_wire(text) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "response conversion failed; using default value");
            T::default()
        }
    }
}

/// Boolean reading of a payload.
///
/// True iff the text is non-empty, is not the nil sentinel, and either equals
/// `OK` or starts with a nonzero integer (`"1"`, `"-3"`, `"12abc"`). Anything
/// else, including arbitrary words such as `"true"`, is false.
pub fn truthy(text: &str) -> bool {
    !text.is_empty() && text != NIL && (text == OK || leading_integer_is_nonzero(text))
}

// Mirrors strtol: skip leading whitespace, accept one sign, read digits until
// the first non-digit.
fn leading_integer_is_nonzero(text: &str) -> bool {
    let digits = text.trim_start();
    let digits = digits
        .strip_prefix('-')
        .or_else(|| digits.strip_prefix('+'))
        .unwrap_or(digits);
    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .any(|b| b != b'0')
}

impl ToWire for str {
    fn try_to_wire(&self) -> Result<String, ConversionError> {
        Ok(self.to_owned())
    }
}

impl ToWire for String {
    fn try_to_wire(&self) -> Result<String, ConversionError> {
        Ok(self.clone())
    }
}

impl ToWire for Cow<'_, str> {
    fn try_to_wire(&self) -> Result<String, ConversionError> {
        Ok(self.as_ref().to_owned())
    }
}

impl ToWire for char {
    fn try_to_wire(&self) -> Result<String, ConversionError> {
        Ok(self.to_string())
    }
}

// "1"/"0" so that booleans read back through `truthy`.
impl ToWire for bool {
    fn try_to_wire(&self) -> Result<String, ConversionError> {
        Ok(if *self { "1" } else { "0" }.to_string())
    }
}

impl ToWire for [u8] {
    fn try_to_wire(&self) -> Result<String, ConversionError> {
        std::str::from_utf8(self)
            .map(str::to_owned)
            .map_err(|_| ConversionError::new("string", format!("{} non-UTF-8 bytes", self.len())))
    }
}

impl<T: ToWire + ?Sized> ToWire for &T {
    fn try_to_wire(&self) -> Result<String, ConversionError> {
        (**self).try_to_wire()
    }
}

macro_rules! display_to_wire {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToWire for $ty {
                fn try_to_wire(&self) -> Result<String, ConversionError> {
                    Ok(self.to_string())
                }
            }
        )*
    };
}

display_to_wire!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

macro_rules! parse_from_wire {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromWire for $ty {
                fn try_from_wire(text: &str) -> Result<Self, ConversionError> {
                    text.parse::<$ty>()
                        .map_err(|_| ConversionError::new(stringify!($ty), text))
                }
            }
        )*
    };
}

parse_from_wire!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl FromWire for String {
    fn try_from_wire(text: &str) -> Result<Self, ConversionError> {
        Ok(text.to_owned())
    }
}

impl FromWire for char {
    fn try_from_wire(text: &str) -> Result<Self, ConversionError> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConversionError::new("char", text)),
        }
    }
}

impl FromWire for bool {
    fn try_from_wire(text: &str) -> Result<Self, ConversionError> {
        Ok(truthy(text))
    }
}

/// The nil sentinel reads as `None`; anything else converts as `T`.
impl<T: FromWire> FromWire for Option<T> {
    fn try_from_wire(text: &str) -> Result<Self, ConversionError> {
        if text == NIL {
            return Ok(None);
        }
        T::try_from_wire(text).map(Some)
    }
}

/// Result type for callers that only want the round-trip confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Discard;

/// Result type for callers that only care whether a reply arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Presence;

impl FromWire for Discard {
    fn try_from_wire(_text: &str) -> Result<Self, ConversionError> {
        Ok(Discard)
    }
}

impl FromWire for Presence {
    fn try_from_wire(_text: &str) -> Result<Self, ConversionError> {
        Ok(Presence)
    }
}

/// Ordered, already stringified command arguments.
///
/// Built once per dispatch and owned by it; nothing outlives the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    items: Vec<String>,
}

impl Args {
    /// Empty argument list.
    pub fn new() -> Self {
        Args::default()
    }

    /// Appends one argument, builder style.
    pub fn arg<T: ToWire>(mut self, value: T) -> Self {
        self.push(&value);
        self
    }

    /// Appends one argument.
    pub fn push<T: ToWire + ?Sized>(&mut self, value: &T) {
        self.items.push(to_wire(value));
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no argument was added.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Arguments in order.
    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    /// Consumes the builder, returning the arguments.
    pub fn into_vec(self) -> Vec<String> {
        self.items
    }
}

/// Anything usable as the argument list of a command.
///
/// Implemented for `()`, tuples of up to ten [`ToWire`] values, sequences of
/// one [`ToWire`] type, single strings, and [`Args`].
pub trait IntoArgs {
    fn into_args(self) -> Args;
}

impl IntoArgs for Args {
    fn into_args(self) -> Args {
        self
    }
}

impl IntoArgs for () {
    fn into_args(self) -> Args {
        Args::new()
    }
}

impl IntoArgs for &str {
    fn into_args(self) -> Args {
        Args::new().arg(self)
    }
}

impl IntoArgs for String {
    fn into_args(self) -> Args {
        Args { items: vec![self] }
    }
}

impl<T: ToWire> IntoArgs for Vec<T> {
    fn into_args(self) -> Args {
        self.as_slice().into_args()
    }
}

impl<T: ToWire> IntoArgs for &[T] {
    fn into_args(self) -> Args {
        let mut args = Args::new();
        for item in self {
            args.push(item);
        }
        args
    }
}

impl<T: ToWire, const N: usize> IntoArgs for [T; N] {
    fn into_args(self) -> Args {
        self.as_slice().into_args()
    }
}

macro_rules! tuple_into_args {
    ($($name:ident),+) => {
        impl<$($name: ToWire),+> IntoArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_args(self) -> Args {
                let ($($name,)+) = self;
                let mut args = Args::new();
                $(args.push(&$name);)+
                args
            }
        }
    };
}

tuple_into_args!(A);
tuple_into_args!(A, B);
tuple_into_args!(A, B, C);
tuple_into_args!(A, B, C, D);
tuple_into_args!(A, B, C, D, E);
tuple_into_args!(A, B, C, D, E, F);
tuple_into_args!(A, B, C, D, E, F, G);
tuple_into_args!(A, B, C, D, E, F, G, H);
tuple_into_args!(A, B, C, D, E, F, G, H, I);
tuple_into_args!(A, B, C, D, E, F, G, H, I, J);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_rule() {
        assert!(!truthy(""));
        assert!(!truthy(NIL));
        assert!(!truthy("0"));
        assert!(!truthy("-0"));
        assert!(!truthy("hello"));
        assert!(!truthy("true"));
        assert!(truthy("OK"));
        assert!(truthy("1"));
        assert!(truthy("-5"));
        assert!(truthy("42"));
        assert!(truthy(" 7"));
        assert!(truthy("12abc"));
        assert!(truthy("99999999999999999999999"));
    }

    #[test]
    fn bool_conversion_uses_truthiness() {
        assert!(from_wire::<bool>("OK"));
        assert!(!from_wire::<bool>("hello"));
        assert_eq!(to_wire(&true), "1");
        assert_eq!(to_wire(&false), "0");
        assert!(from_wire::<bool>(&to_wire(&true)));
        assert!(!from_wire::<bool>(&to_wire(&false)));
    }

    #[test]
    fn scalar_round_trips() {
        assert_eq!(from_wire::<i64>(&to_wire(&-123i64)), -123);
        assert_eq!(from_wire::<u8>(&to_wire(&255u8)), 255);
        assert_eq!(from_wire::<u128>(&to_wire(&u128::MAX)), u128::MAX);
        assert_eq!(from_wire::<f64>(&to_wire(&1.25f64)), 1.25);
        assert_eq!(from_wire::<f64>(&to_wire(&0.1f64)), 0.1);
        assert_eq!(from_wire::<char>(&to_wire(&'é')), 'é');
        assert_eq!(from_wire::<String>(&to_wire("a b")), "a b");
    }

    #[test]
    fn nan_has_no_round_trip() {
        let back = from_wire::<f64>(&to_wire(&f64::NAN));
        assert!(back.is_nan());
    }

    #[test]
    fn failed_parse_falls_back_to_default() {
        assert_eq!(from_wire::<i64>("abc"), 0);
        assert_eq!(from_wire::<f32>(""), 0.0);
        assert_eq!(from_wire::<char>("ab"), char::default());
        let err = i64::try_from_wire("12x").unwrap_err();
        assert_eq!(err.target, "i64");
        assert_eq!(err.input, "12x");
    }

    #[test]
    fn invalid_bytes_become_empty_argument() {
        let bytes: &[u8] = &[0xff, 0xfe];
        assert!(bytes.try_to_wire().is_err());
        assert_eq!(to_wire(bytes), "");
        assert_eq!(to_wire(b"abc".as_slice()), "abc");
    }

    #[test]
    fn option_reads_nil_as_none() {
        assert_eq!(from_wire::<Option<i64>>(NIL), None);
        assert_eq!(from_wire::<Option<i64>>("5"), Some(5));
        assert_eq!(from_wire::<Option<String>>(""), Some(String::new()));
        assert!(Option::<i64>::try_from_wire("x").is_err());
    }

    #[test]
    fn sentinels_always_convert() {
        assert_eq!(Discard::try_from_wire("anything"), Ok(Discard));
        assert_eq!(Presence::try_from_wire(""), Ok(Presence));
    }

    #[test]
    fn tuples_keep_argument_order() {
        let args = ("foo", 123, 1.5f64, true, 'x').into_args();
        assert_eq!(args.as_slice(), ["foo", "123", "1.5", "1", "x"]);
    }

    #[test]
    fn other_argument_shapes() {
        assert!(().into_args().is_empty());
        assert_eq!("key".into_args().as_slice(), ["key"]);
        assert_eq!(vec![1, 2, 3].into_args().len(), 3);
        assert_eq!(["a", "b"].into_args().into_vec(), vec!["a", "b"]);
        let built = Args::new().arg("SETEX").arg(String::from("k")).arg(10u32);
        assert_eq!(built.into_args().as_slice(), ["SETEX", "k", "10"]);
    }
}
