use std::num::NonZeroUsize;

macro_rules! repo_uid {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroUsize);

        impl $name {
            pub(crate) fn idx(self) -> usize {
                self.0.get() - 1
            }

            pub(crate) fn from_idx(idx: usize) -> Self {
                Self(NonZeroUsize::MIN.saturating_add(idx))
            }
        }
    };
}

repo_uid!(
    /// Unique id to identify a file in the repo
    FileUid
);
repo_uid!(
    /// Unique id to identify a namespace in the repo
    NamespaceUid
);
repo_uid!(
    /// Unique id to identify a class in the repo
    ClassUid
);
repo_uid!(
    /// Unique id to identify a method in the repo
    MethodUid
);
repo_uid!(
    /// Unique id to identify a value (local, field access, allocation, ...) in the repo
    ValueUid
);
repo_uid!(
    /// Unique id to identify a statement in the repo
    StmtUid
);
