macro_rules! t {
    ($arg:expr) => {
        ::log::trace!("{}", $arg)
    };
}
