//! Useful macros.

/// Join the given path components with `/`, without doubling separators.
///
/// ```ignore
/// assert_eq!(dir!("logs", "round0/", "x.out"), "logs/round0/x.out");
/// ```
macro_rules! dir {
    ($first:expr $(, $part:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut path = String::from($first);
        $(
            let part = String::from($part);
            if !path.is_empty() && !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(part.trim_start_matches('/'));
        )*
        path
    }};
}
