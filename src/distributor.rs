use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::headline::Headline;

/// Most headlines shown on the panel at once
pub const MAX_DISPLAYED: usize = 26;
pub const COLUMN_COUNT: usize = 3;

/// Headlines laid out across the panel's three columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Columns {
    columns: [Vec<Headline>; COLUMN_COUNT],
}

impl Columns {
    pub fn iter(&self) -> impl Iterator<Item = &Vec<Headline>> {
        self.columns.iter()
    }

    pub fn column(&self, index: usize) -> Option<&[Headline]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
    }
}

/// Spread a random selection of at most [`MAX_DISPLAYED`] headlines over the
/// columns, round-robin starting with the first column.
pub fn distribute(headlines: &[Headline]) -> Columns {
    distribute_with(headlines, &mut rand::thread_rng())
}

pub fn distribute_with<R: Rng + ?Sized>(headlines: &[Headline], rng: &mut R) -> Columns {
    let mut order: Vec<usize> = (0..headlines.len()).collect();
    let (picked, _) = order.partial_shuffle(rng, MAX_DISPLAYED);

    let mut columns = Columns::default();
    for (slot, &index) in picked.iter().enumerate() {
        columns.columns[slot % COLUMN_COUNT].push(headlines[index].clone());
    }
    columns
}
