pub mod domain;
pub mod ports;

pub use domain::{
    adjacent_chapters, needs_profile_completion, upload_file_name, AuthEvent, AuthSession,
    Chapter, ChapterNeighbours, ChapterRef, Identity, Novel, ProfileDraft, ProfileUpdate,
    UploadFile, UserProfile,
};
pub use ports::{
    AuthEventStream, AuthService, LibraryRepository, ObjectStorage, PortError, PortResult,
    ProfileRepository, UploadOptions,
};
