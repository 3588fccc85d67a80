/*!

Types/type aliases that abstract over the implementing backing type.

The rest of the crate never names a concrete hash map, interning crate, or logging backend
directly; it goes through this module, so swapping a backing implementation is a one-line
change here.

*/

mod join;
pub mod log;

// Interned string. Dict keys and string leaves are interned, so cloning a key is a
// reference-count bump and equality is a pointer comparison in the common case.
pub use string_cache::DefaultAtom as IString;

// Insertion-ordered map used for dict values. Equality disregards order.
pub use indexmap::IndexMap;

pub type HashMap<K, V> = std::collections::HashMap<K, V>;
pub type HashSet<T>    = std::collections::HashSet<T>;

// Join sequences with a separator
pub use join::join_string;
