//! Helpers for the pervasive `Option<T>` fields the AWS wire model uses in
//! place of pointers, per spec.md §9 ("Pointer-heavy AWS SDK data").

pub fn ptr<T>(v: T) -> Option<T> {
    Some(v)
}

pub fn deref<T: Clone>(p: &Option<T>, default: T) -> T {
    p.clone().unwrap_or(default)
}

pub fn deref_str(p: &Option<String>) -> String {
    p.clone().unwrap_or_default()
}
