//! Choice manager

use std::sync::Arc;

use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::criteria::SearchCriteria;
use crate::models::{Choice, ChoiceQuery, Criteria, RANDOM_CHOICE_LABEL};
use crate::storage::StoreResult;

use super::StoreContext;

#[derive(Clone)]
pub struct ChoiceManager {
    ctx: Arc<StoreContext>,
}

impl ChoiceManager {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    /// Store a new choice shown in a stored chapter
    pub fn insert(&self, choice: &Choice) -> StoreResult<()> {
        self.ctx.require_chapter(choice.from_chapter)?;
        self.ctx.local.choices.insert(choice)
    }

    pub fn update(&self, choice: &Choice) -> StoreResult<()> {
        self.ctx.require_chapter(choice.from_chapter)?;
        self.ctx.local.choices.update(choice)
    }

    pub(crate) fn upsert(&self, choice: &Choice) -> StoreResult<()> {
        self.ctx.local.choices.upsert(choice)
    }

    pub fn retrieve(&self, query: &ChoiceQuery) -> StoreResult<Vec<Choice>> {
        self.ctx.local.choices.retrieve(&query.search_criteria())
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Option<Choice>> {
        self.ctx.local.choices.get(id)
    }

    pub fn get_all(&self) -> StoreResult<Vec<Choice>> {
        self.ctx.local.choices.retrieve(&SearchCriteria::new())
    }

    /// Choices shown in a chapter, in the order they were added
    pub fn choices_of_chapter(&self, chapter_id: Uuid) -> StoreResult<Vec<Choice>> {
        self.retrieve(&ChoiceQuery::from_chapter(chapter_id))
    }

    /// Pick one of a chapter's choices uniformly at random
    ///
    /// The returned copy is relabeled for display; the stored choice is
    /// untouched. `None` when the chapter has no choices.
    pub fn get_random_choice(&self, chapter_id: Uuid) -> StoreResult<Option<Choice>> {
        let choices = self.choices_of_chapter(chapter_id)?;
        Ok(choices.choose(&mut rand::thread_rng()).map(|choice| Choice {
            text: RANDOM_CHOICE_LABEL.to_string(),
            ..choice.clone()
        }))
    }

    pub fn remove(&self, id: Uuid) -> StoreResult<()> {
        self.ctx.local.choices.remove(id)
    }

    pub(crate) fn remove_chapter_choices(&self, chapter_id: Uuid) -> StoreResult<usize> {
        self.ctx
            .local
            .choices
            .remove_matching(&ChoiceQuery::from_chapter(chapter_id).search_criteria())
    }

    pub(crate) async fn publish(&self, choice: &Choice) -> StoreResult<()> {
        self.ctx.remote.choices.upsert(choice).await
    }

    pub(crate) async fn published_of_chapter(&self, chapter_id: Uuid) -> StoreResult<Vec<Choice>> {
        self.ctx
            .remote
            .choices
            .try_retrieve(&ChoiceQuery::from_chapter(chapter_id).search_criteria())
            .await
    }
}
