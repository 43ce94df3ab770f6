use crate::domain::{Artifact, Collection, Competency, Organization, Rating, User};

/// Any record that lives in one of the collections.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Organization(Organization),
    User(User),
    Competency(Competency),
    Rating(Rating),
    Artifact(Artifact),
}

impl Document {
    pub fn collection(&self) -> Collection {
        match self {
            Document::Organization(_) => Collection::Organizations,
            Document::User(_) => Collection::Users,
            Document::Competency(_) => Collection::Competencies,
            Document::Rating(_) => Collection::Ratings,
            Document::Artifact(_) => Collection::Artifacts,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Document::Organization(record) => record.id.as_str(),
            Document::User(record) => record.id.as_str(),
            Document::Competency(record) => record.id.as_str(),
            Document::Rating(record) => record.id.as_str(),
            Document::Artifact(record) => record.id.as_str(),
        }
    }
}

/// A single document write.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Fails with a conflict when the id is taken.
    Create(Document),
    /// Inserts or replaces.
    Set(Document),
    /// Fails with not-found when the id is absent.
    Update(Document),
}

impl Write {
    pub fn document(&self) -> &Document {
        match self {
            Write::Create(document) | Write::Set(document) | Write::Update(document) => document,
        }
    }
}

/// Ordered writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, document: Document) -> Self {
        self.writes.push(Write::Create(document));
        self
    }

    pub fn set(mut self, document: Document) -> Self {
        self.writes.push(Write::Set(document));
        self
    }

    pub fn update(mut self, document: Document) -> Self {
        self.writes.push(Write::Update(document));
        self
    }

    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}
