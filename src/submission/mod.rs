//! Grant submissions: finalisation, reward-form generation, preview and document merge.

pub mod files;
pub mod handlers;
pub mod model;
pub mod multipart;
pub mod replacements;
pub mod service;
pub mod thai;

pub use model::*;
pub use service::{
    create_submission, merge_submission_documents, preview_reward_form,
    preview_reward_form_from_form, render_preview_pdf, submit_submission,
};
