use crate::compiler_frontend::analysis::move_checker::move_paths::MovePathIndex;

/// Whether a move path holds a value at some program point, across every path reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStatus {
    Init,
    Uninit,
    Maybe,
}

/// Initialization state of every move path of one function.
///
/// A path is definitely initialized when it is in `maybe_init` and not in
/// `maybe_uninit`. The join of two states is a plain union of both sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipState {
    maybe_init: PathSet,
    maybe_uninit: PathSet,
}

impl OwnershipState {
    pub fn new_uninitialized(path_count: usize) -> Self {
        Self {
            maybe_init: PathSet::empty(path_count),
            maybe_uninit: PathSet::full(path_count),
        }
    }

    pub fn path_count(&self) -> usize {
        self.maybe_init.bit_len()
    }

    pub fn initialize(&mut self, paths: &PathSet) {
        self.maybe_init.union_with(paths);
        self.maybe_uninit.subtract(paths);
    }

    pub fn uninitialize(&mut self, paths: &PathSet) {
        self.maybe_init.subtract(paths);
        self.maybe_uninit.union_with(paths);
    }

    pub fn join(&self, other: &Self) -> Self {
        let mut joined = self.clone();
        joined.maybe_init.union_with(&other.maybe_init);
        joined.maybe_uninit.union_with(&other.maybe_uninit);
        joined
    }

    pub fn status(&self, path: MovePathIndex) -> InitStatus {
        match (
            self.maybe_init.contains(path),
            self.maybe_uninit.contains(path),
        ) {
            (true, false) => InitStatus::Init,
            (true, true) => InitStatus::Maybe,
            (false, _) => InitStatus::Uninit,
        }
    }

    pub fn is_definitely_init(&self, path: MovePathIndex) -> bool {
        self.status(path) == InitStatus::Init
    }

    pub fn is_maybe_init(&self, path: MovePathIndex) -> bool {
        self.maybe_init.contains(path)
    }

    /// The first path of `paths` that isn't definitely initialized.
    pub fn first_not_definitely_init(&self, paths: &PathSet) -> Option<MovePathIndex> {
        paths.iter_ones().find(|path| !self.is_definitely_init(*path))
    }

    pub fn all_definitely_init(&self, paths: &PathSet) -> bool {
        self.first_not_definitely_init(paths).is_none()
    }

    pub fn any_maybe_init(&self, paths: &PathSet) -> bool {
        paths.iter_ones().any(|path| self.is_maybe_init(path))
    }

    pub fn maybe_init(&self) -> &PathSet {
        &self.maybe_init
    }

    pub fn maybe_uninit(&self) -> &PathSet {
        &self.maybe_uninit
    }
}

/// Fixed-size bitset over move path indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    words: Vec<u64>,
    bit_len: usize,
}

impl PathSet {
    pub fn empty(bit_len: usize) -> Self {
        let word_len = bit_len.div_ceil(64);
        Self {
            words: vec![0; word_len],
            bit_len,
        }
    }

    pub fn full(bit_len: usize) -> Self {
        let mut set = Self::empty(bit_len);
        for bit_index in 0..bit_len {
            set.insert(bit_index);
        }
        set
    }

    pub fn singleton(bit_len: usize, bit_index: usize) -> Self {
        let mut set = Self::empty(bit_len);
        set.insert(bit_index);
        set
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn insert(&mut self, bit_index: usize) {
        if bit_index >= self.bit_len {
            return;
        }

        let word_index = bit_index / 64;
        let bit_offset = bit_index % 64;
        self.words[word_index] |= 1u64 << bit_offset;
    }

    pub fn remove(&mut self, bit_index: usize) {
        if bit_index >= self.bit_len {
            return;
        }

        let word_index = bit_index / 64;
        let bit_offset = bit_index % 64;
        self.words[word_index] &= !(1u64 << bit_offset);
    }

    pub fn contains(&self, bit_index: usize) -> bool {
        if bit_index >= self.bit_len {
            return false;
        }

        let word_index = bit_index / 64;
        let bit_offset = bit_index % 64;
        (self.words[word_index] & (1u64 << bit_offset)) != 0
    }

    pub fn union_with(&mut self, other: &Self) {
        for (left, right) in self.words.iter_mut().zip(other.words.iter()) {
            *left |= *right;
        }
    }

    pub fn subtract(&mut self, other: &Self) {
        for (left, right) in self.words.iter_mut().zip(other.words.iter()) {
            *left &= !*right;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    pub fn count(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    pub fn iter_ones(&self) -> PathSetIter<'_> {
        PathSetIter {
            set: self,
            word_index: 0,
            current_word: if self.words.is_empty() {
                0
            } else {
                self.words[0]
            },
        }
    }
}

pub struct PathSetIter<'a> {
    set: &'a PathSet,
    word_index: usize,
    current_word: u64,
}

impl<'a> Iterator for PathSetIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.word_index >= self.set.words.len() {
                return None;
            }

            if self.current_word != 0 {
                let trailing = self.current_word.trailing_zeros() as usize;
                let bit_index = self.word_index * 64 + trailing;
                self.current_word &= self.current_word - 1;

                if bit_index < self.set.bit_len {
                    return Some(bit_index);
                }

                continue;
            }

            self.word_index += 1;
            if self.word_index < self.set.words.len() {
                self.current_word = self.set.words[self.word_index];
            }
        }
    }
}
