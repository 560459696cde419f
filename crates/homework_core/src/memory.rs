//! crates/homework_core/src/memory.rs
//!
//! An in-process implementation of every port, holding all tables in memory.
//! It applies the same visibility rules as the Postgres adapter and is used as
//! the test double for the services and the HTTP layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    Assignment, AssignmentFilter, AssignmentPatch, AssignmentStatus, Attachment, ColorTheme,
    CustomPage, CustomSubject, CustomTranslation, ElementColor, NewAssignment, NewAttachment,
    NewCustomPage, NewTranslation, ParentStudentRelationship, Profile, ProfilePatch,
    SubjectNames, User, UserCredentials, UserRelationship,
};
use crate::ports::{
    AccountService, AssignmentRepository, AttachmentRepository, CustomPageRepository,
    ObjectStorage, PortError, PortResult, ProfileRepository, RelationshipRepository,
    SubjectRepository, ThemeRepository, TranslationRepository,
};

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    resets: HashMap<String, (Uuid, DateTime<Utc>, bool)>,
    assignments: Vec<Assignment>,
    subjects: Vec<CustomSubject>,
    translations: Vec<CustomTranslation>,
    parent_links: Vec<ParentStudentRelationship>,
    user_links: Vec<UserRelationship>,
    attachments: Vec<Attachment>,
    profiles: HashMap<Uuid, Profile>,
    themes: Vec<ColorTheme>,
    element_colors: HashMap<Uuid, Vec<ElementColor>>,
    pages: Vec<CustomPage>,
    objects: HashMap<String, (Bytes, String)>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing timestamps keep `created_at` ordering deterministic.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn is_parent_of(&self, parent: Uuid, student: Uuid) -> bool {
        self.parent_links
            .iter()
            .any(|l| l.parent_id == parent && l.student_id == student)
    }

    fn can_see_owner(&self, caller: Uuid, owner: Uuid) -> bool {
        caller == owner || self.is_parent_of(caller, owner)
    }

    fn visible_assignment(&self, caller: Uuid, id: Uuid) -> PortResult<&Assignment> {
        self.assignments
            .iter()
            .find(|a| a.id == id && self.can_see_owner(caller, a.user_id))
            .ok_or_else(|| PortError::NotFound(format!("Assignment {} not found", id)))
    }
}

#[derive(Default)]
pub struct InMemoryBackend {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `PortError::Remote`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Whether an object is stored under `path`.
    pub fn has_object(&self, path: &str) -> bool {
        self.lock().objects.contains_key(path)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tables(&self) -> PortResult<MutexGuard<'_, Tables>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::Remote("service unavailable".to_string()));
        }
        Ok(self.lock())
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", kind, id))
}

//=========================================================================================
// AccountService
//=========================================================================================

#[async_trait]
impl AccountService for InMemoryBackend {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut t = self.tables()?;
        if t.users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(PortError::Conflict(format!("Email {} already registered", email)));
        }
        let user_id = Uuid::new_v4();
        t.users.push(UserCredentials {
            user_id,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables()?
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| not_found("User", email))
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.tables()?
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .map(|u| User {
                user_id: u.user_id,
                email: Some(u.email.clone()),
            })
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let mut t = self.tables()?;
        let user = t
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| not_found("User", user_id))?;
        user.hashed_password = hashed_password.to_string();
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables()?
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.tables()?.sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables()?.sessions.remove(session_id);
        Ok(())
    }

    async fn create_password_reset(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables()?
            .resets
            .insert(token.to_string(), (user_id, expires_at, false));
        Ok(())
    }

    async fn consume_password_reset(&self, token: &str) -> PortResult<Uuid> {
        let mut t = self.tables()?;
        match t.resets.get_mut(token) {
            Some((user_id, expires_at, used)) if !*used && *expires_at > Utc::now() => {
                *used = true;
                Ok(*user_id)
            }
            _ => Err(PortError::NotFound("Reset token not found".to_string())),
        }
    }
}

//=========================================================================================
// AssignmentRepository
//=========================================================================================

#[async_trait]
impl AssignmentRepository for InMemoryBackend {
    async fn list(&self, caller: Uuid, filter: &AssignmentFilter) -> PortResult<Vec<Assignment>> {
        let t = self.tables()?;
        let mut rows: Vec<Assignment> = t
            .assignments
            .iter()
            .rev()
            .filter(|a| filter.owner_ids.contains(&a.user_id))
            .filter(|a| t.can_see_owner(caller, a.user_id))
            .filter(|a| filter.archived.map_or(true, |flag| a.archived == flag))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get(&self, caller: Uuid, id: Uuid) -> PortResult<Assignment> {
        self.tables()?.visible_assignment(caller, id).cloned()
    }

    async fn create(&self, caller: Uuid, fields: &NewAssignment) -> PortResult<Assignment> {
        let mut t = self.tables()?;
        let now = t.now();
        let assignment = Assignment {
            id: Uuid::new_v4(),
            user_id: caller,
            title: fields.title.clone(),
            description: fields.description.clone(),
            subject: fields.subject.clone(),
            assignment_type: fields.assignment_type,
            due_date: fields.due_date,
            status: AssignmentStatus::NotStarted,
            archived: false,
            created_at: now,
            updated_at: now,
        };
        t.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        patch: &AssignmentPatch,
    ) -> PortResult<Assignment> {
        let mut t = self.tables()?;
        t.visible_assignment(caller, id)?;
        let now = t.now();
        let row = t
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("Assignment", id))?;
        patch.apply_to(row, now);
        Ok(row.clone())
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let mut t = self.tables()?;
        let before = t.assignments.len();
        t.assignments.retain(|a| !(a.id == id && a.user_id == caller));
        if t.assignments.len() == before {
            return Err(not_found("Assignment", id));
        }
        t.attachments.retain(|a| a.assignment_id != id);
        Ok(())
    }
}

//=========================================================================================
// SubjectRepository / TranslationRepository
//=========================================================================================

#[async_trait]
impl SubjectRepository for InMemoryBackend {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomSubject>> {
        Ok(self
            .tables()?
            .subjects
            .iter()
            .filter(|s| s.user_id == caller)
            .cloned()
            .collect())
    }

    async fn create(&self, caller: Uuid, names: &SubjectNames) -> PortResult<CustomSubject> {
        let mut t = self.tables()?;
        let subject = CustomSubject {
            id: Uuid::new_v4(),
            user_id: caller,
            name_en: names.name_en.clone(),
            name_he: names.name_he.clone(),
            created_at: t.now(),
        };
        t.subjects.push(subject.clone());
        Ok(subject)
    }

    async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        names: &SubjectNames,
    ) -> PortResult<CustomSubject> {
        let mut t = self.tables()?;
        let subject = t
            .subjects
            .iter_mut()
            .find(|s| s.id == id && s.user_id == caller)
            .ok_or_else(|| not_found("Subject", id))?;
        subject.name_en = names.name_en.clone();
        subject.name_he = names.name_he.clone();
        Ok(subject.clone())
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let mut t = self.tables()?;
        let before = t.subjects.len();
        t.subjects.retain(|s| !(s.id == id && s.user_id == caller));
        if t.subjects.len() == before {
            return Err(not_found("Subject", id));
        }
        Ok(())
    }
}

#[async_trait]
impl TranslationRepository for InMemoryBackend {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomTranslation>> {
        Ok(self
            .tables()?
            .translations
            .iter()
            .filter(|tr| tr.user_id == caller)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        caller: Uuid,
        fields: &NewTranslation,
    ) -> PortResult<CustomTranslation> {
        let mut t = self.tables()?;
        let translation = CustomTranslation {
            id: Uuid::new_v4(),
            user_id: caller,
            key: fields.key.clone(),
            text_en: fields.text_en.clone(),
            text_he: fields.text_he.clone(),
            page: fields.page.clone(),
            created_at: t.now(),
        };
        t.translations.push(translation.clone());
        Ok(translation)
    }

    async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        fields: &NewTranslation,
    ) -> PortResult<CustomTranslation> {
        let mut t = self.tables()?;
        let translation = t
            .translations
            .iter_mut()
            .find(|tr| tr.id == id && tr.user_id == caller)
            .ok_or_else(|| not_found("Translation", id))?;
        translation.key = fields.key.clone();
        translation.text_en = fields.text_en.clone();
        translation.text_he = fields.text_he.clone();
        translation.page = fields.page.clone();
        Ok(translation.clone())
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let mut t = self.tables()?;
        let before = t.translations.len();
        t.translations.retain(|tr| !(tr.id == id && tr.user_id == caller));
        if t.translations.len() == before {
            return Err(not_found("Translation", id));
        }
        Ok(())
    }
}

//=========================================================================================
// RelationshipRepository
//=========================================================================================

#[async_trait]
impl RelationshipRepository for InMemoryBackend {
    async fn list_students(&self, parent: Uuid) -> PortResult<Vec<ParentStudentRelationship>> {
        Ok(self
            .tables()?
            .parent_links
            .iter()
            .filter(|l| l.parent_id == parent)
            .cloned()
            .collect())
    }

    async fn list_parent_links(&self, caller: Uuid) -> PortResult<Vec<ParentStudentRelationship>> {
        Ok(self
            .tables()?
            .parent_links
            .iter()
            .filter(|l| l.parent_id == caller || l.student_id == caller)
            .cloned()
            .collect())
    }

    async fn create_parent_link(
        &self,
        caller: Uuid,
        student_id: Uuid,
        relationship_type: Option<&str>,
    ) -> PortResult<ParentStudentRelationship> {
        let mut t = self.tables()?;
        if t.is_parent_of(caller, student_id) {
            return Err(PortError::Conflict("Student already linked".to_string()));
        }
        let link = ParentStudentRelationship {
            id: Uuid::new_v4(),
            parent_id: caller,
            student_id,
            relationship_type: relationship_type.map(str::to_string),
            created_at: t.now(),
        };
        t.parent_links.push(link.clone());
        Ok(link)
    }

    async fn delete_parent_link(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let mut t = self.tables()?;
        let before = t.parent_links.len();
        t.parent_links
            .retain(|l| !(l.id == id && (l.parent_id == caller || l.student_id == caller)));
        if t.parent_links.len() == before {
            return Err(not_found("Relationship", id));
        }
        Ok(())
    }

    async fn list_user_relationships(&self, caller: Uuid) -> PortResult<Vec<UserRelationship>> {
        Ok(self
            .tables()?
            .user_links
            .iter()
            .filter(|l| l.user_id == caller || l.related_user_id == caller)
            .cloned()
            .collect())
    }

    async fn create_user_relationship(
        &self,
        caller: Uuid,
        related_user_id: Uuid,
        relationship_type: Option<&str>,
    ) -> PortResult<UserRelationship> {
        let mut t = self.tables()?;
        if t
            .user_links
            .iter()
            .any(|l| l.user_id == caller && l.related_user_id == related_user_id)
        {
            return Err(PortError::Conflict("Users already related".to_string()));
        }
        let link = UserRelationship {
            id: Uuid::new_v4(),
            user_id: caller,
            related_user_id,
            relationship_type: relationship_type.map(str::to_string),
            created_at: t.now(),
        };
        t.user_links.push(link.clone());
        Ok(link)
    }

    async fn delete_user_relationship(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let mut t = self.tables()?;
        let before = t.user_links.len();
        t.user_links
            .retain(|l| !(l.id == id && (l.user_id == caller || l.related_user_id == caller)));
        if t.user_links.len() == before {
            return Err(not_found("Relationship", id));
        }
        Ok(())
    }
}

//=========================================================================================
// AttachmentRepository / ObjectStorage
//=========================================================================================

#[async_trait]
impl AttachmentRepository for InMemoryBackend {
    async fn list(&self, caller: Uuid, assignment_id: Uuid) -> PortResult<Vec<Attachment>> {
        let t = self.tables()?;
        t.visible_assignment(caller, assignment_id)?;
        Ok(t.attachments
            .iter()
            .filter(|a| a.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn get(&self, caller: Uuid, id: Uuid) -> PortResult<Attachment> {
        let t = self.tables()?;
        let attachment = t
            .attachments
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("Attachment", id))?;
        t.visible_assignment(caller, attachment.assignment_id)
            .map_err(|_| not_found("Attachment", id))?;
        Ok(attachment.clone())
    }

    async fn create(&self, caller: Uuid, fields: &NewAttachment) -> PortResult<Attachment> {
        let mut t = self.tables()?;
        t.visible_assignment(caller, fields.assignment_id)?;
        let attachment = Attachment {
            id: Uuid::new_v4(),
            assignment_id: fields.assignment_id,
            file_name: fields.file_name.clone(),
            storage_path: fields.storage_path.clone(),
            content_type: fields.content_type.clone(),
            size: fields.size,
            created_at: t.now(),
        };
        t.attachments.push(attachment.clone());
        Ok(attachment)
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let mut t = self.tables()?;
        let assignment_id = t
            .attachments
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.assignment_id)
            .ok_or_else(|| not_found("Attachment", id))?;
        t.visible_assignment(caller, assignment_id)
            .map_err(|_| not_found("Attachment", id))?;
        t.attachments.retain(|a| a.id != id);
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for InMemoryBackend {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> PortResult<()> {
        self.tables()?
            .objects
            .insert(path.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        self.tables()?
            .objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found("Object", path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}", path)
    }
}

//=========================================================================================
// ProfileRepository / ThemeRepository / CustomPageRepository
//=========================================================================================

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn get_or_create(&self, caller: Uuid, email: Option<&str>) -> PortResult<Profile> {
        let mut t = self.tables()?;
        let now = t.now();
        let profile = t.profiles.entry(caller).or_insert_with(|| Profile {
            user_id: caller,
            email: email.map(str::to_string),
            display_name: None,
            role: None,
            created_at: now,
            updated_at: now,
        });
        Ok(profile.clone())
    }

    async fn update(&self, caller: Uuid, patch: &ProfilePatch) -> PortResult<Profile> {
        let mut t = self.tables()?;
        let now = t.now();
        let profile = t
            .profiles
            .get_mut(&caller)
            .ok_or_else(|| not_found("Profile", caller))?;
        if let Some(display_name) = &patch.display_name {
            profile.display_name = display_name.clone();
        }
        if let Some(role) = patch.role {
            profile.role = role;
        }
        profile.updated_at = now;
        Ok(profile.clone())
    }
}

#[async_trait]
impl ThemeRepository for InMemoryBackend {
    async fn list_themes(&self, caller: Uuid) -> PortResult<Vec<ColorTheme>> {
        Ok(self
            .tables()?
            .themes
            .iter()
            .filter(|th| th.user_id == Some(caller))
            .cloned()
            .collect())
    }

    async fn get_theme(&self, caller: Uuid, id: Uuid) -> PortResult<ColorTheme> {
        self.tables()?
            .themes
            .iter()
            .find(|th| th.id == id && th.user_id == Some(caller))
            .cloned()
            .ok_or_else(|| not_found("Theme", id))
    }

    async fn create_theme(
        &self,
        caller: Uuid,
        name: &str,
        colors: &[ElementColor],
    ) -> PortResult<ColorTheme> {
        let mut t = self.tables()?;
        let theme = ColorTheme {
            id: Uuid::new_v4(),
            user_id: Some(caller),
            name: name.to_string(),
            is_preset: false,
            colors: colors.to_vec(),
            created_at: t.now(),
        };
        t.themes.push(theme.clone());
        Ok(theme)
    }

    async fn delete_theme(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let mut t = self.tables()?;
        let before = t.themes.len();
        t.themes.retain(|th| !(th.id == id && th.user_id == Some(caller)));
        if t.themes.len() == before {
            return Err(not_found("Theme", id));
        }
        Ok(())
    }

    async fn list_element_colors(&self, caller: Uuid) -> PortResult<Vec<ElementColor>> {
        Ok(self
            .tables()?
            .element_colors
            .get(&caller)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_element_colors(&self, caller: Uuid, colors: &[ElementColor]) -> PortResult<()> {
        self.tables()?.element_colors.insert(caller, colors.to_vec());
        Ok(())
    }
}

#[async_trait]
impl CustomPageRepository for InMemoryBackend {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomPage>> {
        Ok(self
            .tables()?
            .pages
            .iter()
            .filter(|p| p.user_id == caller)
            .cloned()
            .collect())
    }

    async fn get_by_slug(&self, caller: Uuid, slug: &str) -> PortResult<CustomPage> {
        self.tables()?
            .pages
            .iter()
            .find(|p| p.user_id == caller && p.slug == slug)
            .cloned()
            .ok_or_else(|| not_found("Page", slug))
    }

    async fn create(&self, caller: Uuid, fields: &NewCustomPage) -> PortResult<CustomPage> {
        let mut t = self.tables()?;
        if t.pages.iter().any(|p| p.user_id == caller && p.slug == fields.slug) {
            return Err(PortError::Conflict(format!("Page '{}' already exists", fields.slug)));
        }
        let page = CustomPage {
            id: Uuid::new_v4(),
            user_id: caller,
            slug: fields.slug.clone(),
            title: fields.title.clone(),
            created_at: t.now(),
        };
        t.pages.push(page.clone());
        Ok(page)
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let mut t = self.tables()?;
        let before = t.pages.len();
        t.pages.retain(|p| !(p.id == id && p.user_id == caller));
        if t.pages.len() == before {
            return Err(not_found("Page", id));
        }
        Ok(())
    }
}
