//! crates/homework_core/src/i18n.rs
//!
//! UI text in English and Hebrew.
//!
//! The static table is a closed enum resolved by an exhaustive `match`, so a key
//! without text does not compile. Per-user [`CustomTranslation`] rows override
//! the static pair: a row scoped to the current page wins over a global row,
//! which wins over the static text.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::{CustomTranslation, ParseEnumError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    English,
    Hebrew,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hebrew => "he",
        }
    }

    /// Text direction for the document root.
    pub fn direction(self) -> &'static str {
        match self {
            Language::English => "ltr",
            Language::Hebrew => "rtl",
        }
    }
}

impl FromStr for Language {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "he" | "hebrew" => Ok(Language::Hebrew),
            _ => Err(ParseEnumError {
                kind: "language",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

macro_rules! text_keys {
    ($($variant:ident => $key:literal: $en:literal, $he:literal;)*) => {
        /// Every static UI string.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TextKey {
            $($variant,)*
        }

        impl TextKey {
            pub const ALL: &'static [TextKey] = &[$(TextKey::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(TextKey::$variant => $key,)*
                }
            }

            /// The (English, Hebrew) pair.
            pub fn pair(self) -> (&'static str, &'static str) {
                match self {
                    $(TextKey::$variant => ($en, $he),)*
                }
            }
        }
    };
}

text_keys! {
    AppTitle => "appTitle": "Homework Tracker", "מעקב שיעורי בית";
    Dashboard => "dashboard": "Dashboard", "לוח בקרה";
    Archive => "archive": "Archive", "ארכיון";
    Settings => "settings": "Settings", "הגדרות";
    Help => "help": "Help", "עזרה";
    SignIn => "signIn": "Sign in", "התחברות";
    SignUp => "signUp": "Sign up", "הרשמה";
    SignOut => "signOut": "Sign out", "התנתקות";
    Email => "email": "Email", "דוא\"ל";
    Password => "password": "Password", "סיסמה";
    ForgotPassword => "forgotPassword": "Forgot password?", "שכחת סיסמה?";
    ResetPassword => "resetPassword": "Reset password", "איפוס סיסמה";
    AddAssignment => "addAssignment": "Add assignment", "הוספת משימה";
    EditAssignment => "editAssignment": "Edit assignment", "עריכת משימה";
    DeleteAssignment => "deleteAssignment": "Delete assignment", "מחיקת משימה";
    Title => "title": "Title", "כותרת";
    Description => "description": "Description", "תיאור";
    Subject => "subject": "Subject", "מקצוע";
    Type => "type": "Type", "סוג";
    DueDate => "dueDate": "Due date", "תאריך הגשה";
    Status => "status": "Status", "סטטוס";
    Homework => "homework": "Homework", "שיעורי בית";
    Test => "test": "Test", "מבחן";
    NotStarted => "notStarted": "Not started", "טרם התחיל";
    InProgress => "inProgress": "In progress", "בתהליך";
    Completed => "completed": "Completed", "הושלם";
    All => "all": "All", "הכל";
    Upcoming => "upcoming": "Upcoming", "קרובים";
    Tests => "tests": "Tests", "מבחנים";
    HideCompleted => "hideCompleted": "Hide completed", "הסתרת משימות שהושלמו";
    StudentView => "studentView": "Student view", "תצוגת תלמיד";
    ParentView => "parentView": "Parent view", "תצוגת הורה";
    Save => "save": "Save", "שמירה";
    Cancel => "cancel": "Cancel", "ביטול";
    ArchiveAction => "archiveAction": "Move to archive", "העברה לארכיון";
    Unarchive => "unarchive": "Restore", "שחזור";
    NoAssignments => "noAssignments": "No assignments yet", "אין משימות עדיין";
    CustomSubjects => "customSubjects": "Custom subjects", "מקצועות מותאמים";
    AddSubject => "addSubject": "Add subject", "הוספת מקצוע";
    SubjectNameEn => "subjectNameEn": "Name (English)", "שם (אנגלית)";
    SubjectNameHe => "subjectNameHe": "Name (Hebrew)", "שם (עברית)";
    Translations => "translations": "Translations", "תרגומים";
    ColorTheme => "colorTheme": "Color theme", "ערכת צבעים";
    SaveTheme => "saveTheme": "Save theme", "שמירת ערכה";
    ResetTheme => "resetTheme": "Reset colors", "איפוס צבעים";
    FunMode => "funMode": "Fun mode", "מצב כיף";
    Language => "language": "Language", "שפה";
    Relationships => "relationships": "Family", "משפחה";
    AddStudent => "addStudent": "Link a student", "קישור תלמיד";
    Attachments => "attachments": "Attachments", "קבצים מצורפים";
    UploadFile => "uploadFile": "Upload file", "העלאת קובץ";
    Profile => "profile": "Profile", "פרופיל";
    DisplayName => "displayName": "Display name", "שם תצוגה";
    Math => "math": "Math", "מתמטיקה";
    Science => "science": "Science", "מדעים";
    English => "english": "English", "אנגלית";
    History => "history": "History", "היסטוריה";
    Other => "other": "Other", "אחר";
    Loading => "loading": "Loading...", "טוען...";
    ErrorGeneric => "errorGeneric": "Something went wrong", "משהו השתבש";
    TitleRequired => "titleRequired": "Title is required", "יש להזין כותרת";
    DueDateRequired => "dueDateRequired": "Due date is required", "יש להזין תאריך הגשה";
    HelpIntro => "helpIntro": "Track homework and tests, filter by status and share progress with your family.", "עקבו אחר שיעורי בית ומבחנים, סננו לפי סטטוס ושתפו את ההתקדמות עם המשפחה.";
}

impl TextKey {
    pub fn text(self, language: Language) -> &'static str {
        let (en, he) = self.pair();
        match language {
            Language::English => en,
            Language::Hebrew => he,
        }
    }
}

impl FromStr for TextKey {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "text key",
                value: s.to_string(),
            })
    }
}

/// Resolves text for one user on one page.
pub struct Translator<'a> {
    overrides: &'a [CustomTranslation],
    page: Option<&'a str>,
}

impl<'a> Translator<'a> {
    pub fn new(overrides: &'a [CustomTranslation]) -> Self {
        Self {
            overrides,
            page: None,
        }
    }

    pub fn for_page(mut self, page: Option<&'a str>) -> Self {
        self.page = page;
        self
    }

    fn custom(&self, key: &str) -> Option<&'a CustomTranslation> {
        let mut global = None;
        for tr in self.overrides.iter().filter(|tr| tr.key == key) {
            match (&tr.page, self.page) {
                (Some(scope), Some(page)) if scope == page => return Some(tr),
                (None, _) => global = global.or(Some(tr)),
                _ => {}
            }
        }
        global
    }

    pub fn text(&self, key: TextKey, language: Language) -> &'a str {
        match self.custom(key.as_str()) {
            Some(tr) => pick(tr, language),
            None => key.text(language),
        }
    }

    /// Looks up an arbitrary key. Keys outside the static table resolve only
    /// through a custom row.
    pub fn lookup(&self, key: &str, language: Language) -> Option<&'a str> {
        if let Some(tr) = self.custom(key) {
            return Some(pick(tr, language));
        }
        key.parse::<TextKey>().ok().map(|k| k.text(language))
    }

    /// The full resolved table, static keys plus custom-only keys.
    pub fn table(&self, language: Language) -> BTreeMap<String, String> {
        let mut table: BTreeMap<String, String> = TextKey::ALL
            .iter()
            .map(|k| (k.as_str().to_string(), self.text(*k, language).to_string()))
            .collect();
        for tr in self.overrides {
            if let Some(text) = self.lookup(&tr.key, language) {
                table.insert(tr.key.clone(), text.to_string());
            }
        }
        table
    }
}

fn pick(tr: &CustomTranslation, language: Language) -> &str {
    match language {
        Language::English => &tr.text_en,
        Language::Hebrew => &tr.text_he,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn custom(key: &str, en: &str, page: Option<&str>) -> CustomTranslation {
        CustomTranslation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            key: key.to_string(),
            text_en: en.to_string(),
            text_he: format!("{} (he)", en),
            page: page.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn every_key_has_both_languages_and_unique_name() {
        let mut seen = std::collections::HashSet::new();
        for key in TextKey::ALL {
            let (en, he) = key.pair();
            assert!(!en.is_empty() && !he.is_empty(), "{:?}", key);
            assert!(seen.insert(key.as_str()), "duplicate key {}", key.as_str());
            assert_eq!(key.as_str().parse::<TextKey>(), Ok(*key));
        }
    }

    #[test]
    fn static_text_without_overrides() {
        let translator = Translator::new(&[]);
        assert_eq!(translator.text(TextKey::Homework, Language::English), "Homework");
        assert_eq!(translator.text(TextKey::Homework, Language::Hebrew), "שיעורי בית");
    }

    #[test]
    fn page_scoped_override_beats_global_override() {
        let overrides = vec![
            custom("dashboard", "My desk", None),
            custom("dashboard", "Chemistry desk", Some("chemistry")),
        ];

        let global = Translator::new(&overrides);
        assert_eq!(global.text(TextKey::Dashboard, Language::English), "My desk");

        let scoped = Translator::new(&overrides).for_page(Some("chemistry"));
        assert_eq!(scoped.text(TextKey::Dashboard, Language::English), "Chemistry desk");
        assert_eq!(
            scoped.text(TextKey::Dashboard, Language::Hebrew),
            "Chemistry desk (he)"
        );

        let elsewhere = Translator::new(&overrides).for_page(Some("biology"));
        assert_eq!(elsewhere.text(TextKey::Dashboard, Language::English), "My desk");
    }

    #[test]
    fn scoped_override_does_not_leak_to_other_pages() {
        let overrides = vec![custom("archive", "Old stuff", Some("attic"))];
        let translator = Translator::new(&overrides);
        assert_eq!(translator.text(TextKey::Archive, Language::English), "Archive");
    }

    #[test]
    fn table_includes_custom_only_keys() {
        let overrides = vec![custom("greeting", "Hi there", None)];
        let table = Translator::new(&overrides).table(Language::English);
        assert_eq!(table.get("greeting").map(String::as_str), Some("Hi there"));
        assert_eq!(table.get("save").map(String::as_str), Some("Save"));
        assert_eq!(Translator::new(&[]).lookup("greeting", Language::English), None);
    }

    #[test]
    fn language_codes_and_direction() {
        assert_eq!("he".parse::<Language>(), Ok(Language::Hebrew));
        assert_eq!(Language::Hebrew.direction(), "rtl");
        assert_eq!(Language::default(), Language::English);
    }
}
