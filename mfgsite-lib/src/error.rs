/// declares a `Context` trait for the given error type so each crate can
/// attach string context to foreign `Result`s and `Option`s
#[macro_export]
macro_rules! context_trait {
    ($e:path) => {
        pub trait Context<T, E> {
            fn context<C>(self, cxt: C) -> std::result::Result<T, $e>
            where
                C: Into<String>;
        }
    };
}
