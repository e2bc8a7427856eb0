//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two instances with the same attributes are
/// the same value. `Money` and member names are value objects; groups and
/// wallets are not.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Weight(u32);
///
/// impl ValueObject for Weight {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
