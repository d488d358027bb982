pub(crate) mod adhoc;
pub(crate) mod helpers;
pub(crate) mod run;
