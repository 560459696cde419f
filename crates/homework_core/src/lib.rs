pub mod cache;
pub mod context;
pub mod domain;
pub mod filter;
pub mod forms;
pub mod i18n;
pub mod memory;
pub mod ports;
pub mod query;
pub mod service;
pub mod theme;

pub use domain::{
    Assignment, AssignmentFilter, AssignmentPatch, AssignmentStatus, AssignmentType, Attachment,
    AuthSession, BuiltinSubject, ColorTheme, CustomPage, CustomSubject, CustomTranslation,
    ElementColor, NewAssignment, NewAttachment, NewCustomPage, NewTranslation,
    ParentStudentRelationship, Profile, ProfilePatch, ProfileRole, Subject, SubjectNames, User,
    UserCredentials, UserRelationship,
};
pub use ports::{
    AccountService, AssignmentRepository, AttachmentRepository, CustomPageRepository,
    ObjectStorage, PortError, PortResult, ProfileRepository, RelationshipRepository,
    SubjectRepository, ThemeRepository, TranslationRepository,
};
