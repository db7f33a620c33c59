//! Buffer Pool: an in-memory cache of fixed-size frames over a single
//! [`storage::PageFile`], with pin/unpin reference counting, dirty
//! tracking, and FIFO/LRU replacement.
//!
//! This is THE CORE subsystem: frame allocation, pin semantics, and
//! correct disk write-back on eviction and shutdown.


use common::{DbError, DbResult, ReplacementStrategy};
use hashbrown::HashMap;
use storage::{PAGE_SIZE, PageFile};

/// A single cache slot. `page_num` is `None` when the frame is empty;
/// `order` is a strategy-dependent ordering token used to pick the next
/// eviction victim.
struct Frame {
    data: Box<[u8; PAGE_SIZE]>,
    page_num: Option<u64>,
    dirty: bool,
    fix_count: u32,
    order: u64,
}

impl Frame {
    fn empty() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
            page_num: None,
            dirty: false,
            fix_count: 0,
            order: 0,
        }
    }
}

/// A pinned reference to a resident page. Borrowed from the pool until the
/// matching [`BufferPool::unpin_page`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageHandle {
    pub page_num: u64,
}

/// Cache of `num_frames` frames over one page file.
pub struct BufferPool {
    file: PageFile,
    frames: Vec<Frame>,
    page_table: HashMap<u64, usize>,
    strategy: ReplacementStrategy,
    clock: u64,
    num_read_io: u64,
    num_write_io: u64,
}

impl BufferPool {
    /// Open `file` and allocate `num_frames` empty frames using the given
    /// replacement strategy. Only `Fifo` and `Lru` are implemented; `Clock`
    /// and `LruK` are reserved tags and are rejected here.
    pub fn init(file: PageFile, num_frames: usize, strategy: ReplacementStrategy) -> DbResult<Self> {
        match strategy {
            ReplacementStrategy::Fifo | ReplacementStrategy::Lru => {}
            ReplacementStrategy::Clock | ReplacementStrategy::LruK => {
                return Err(DbError::GeneralError(format!(
                    "replacement strategy {strategy:?} is a reserved tag, not implemented"
                )));
            }
        }
        if num_frames == 0 {
            return Err(DbError::GeneralError("numFrames must be > 0".into()));
        }
        Ok(Self {
            file,
            frames: (0..num_frames).map(|_| Frame::empty()).collect(),
            page_table: HashMap::new(),
            strategy,
            clock: 0,
            num_read_io: 0,
            num_write_io: 0,
        })
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Pin `page_num`, loading it from disk if it is not already resident.
    /// A read past end-of-file is satisfied by first extending the file so
    /// it returns a zero-filled page.
    pub fn pin_page(&mut self, page_num: u64) -> DbResult<PageHandle> {
        if let Some(&idx) = self.page_table.get(&page_num) {
            self.frames[idx].fix_count += 1;
            if self.strategy == ReplacementStrategy::Lru {
                let order = self.tick();
                self.frames[idx].order = order;
            }
            return Ok(PageHandle { page_num });
        }

        let idx = match self.frames.iter().position(|f| f.page_num.is_none()) {
            Some(idx) => idx,
            None => self.evict_victim()?,
        };
        self.load_into(idx, page_num)?;
        Ok(PageHandle { page_num })
    }

    /// Choose an unpinned frame to reuse. FIFO and LRU both pick the frame
    /// with the smallest `order`; they differ only in when `order` is
    /// updated (see `pin_page` and `load_into`).
    fn evict_victim(&mut self) -> DbResult<usize> {
        let victim = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.fix_count == 0)
            .min_by_key(|(_, f)| f.order)
            .map(|(idx, _)| idx)
            .ok_or(DbError::BufferPoolFull)?;

        if self.frames[victim].dirty {
            let victim_page = self.frames[victim]
                .page_num
                .expect("dirty frame must be occupied");
            self.file.ensure_capacity(victim_page + 1)?;
            self.file.write_block(victim_page, &*self.frames[victim].data)?;
            self.num_write_io += 1;
            self.frames[victim].dirty = false;
        }
        if let Some(old_page) = self.frames[victim].page_num {
            self.page_table.remove(&old_page);
        }
        Ok(victim)
    }

    fn load_into(&mut self, idx: usize, page_num: u64) -> DbResult<()> {
        self.file.ensure_capacity(page_num + 1)?;
        let mut buf = [0u8; PAGE_SIZE];
        self.file.read_block(page_num, &mut buf)?;
        self.num_read_io += 1;

        let order = self.tick();
        self.frames[idx] = Frame {
            data: Box::new(buf),
            page_num: Some(page_num),
            dirty: false,
            fix_count: 1,
            order,
        };
        self.page_table.insert(page_num, idx);
        Ok(())
    }

    /// Decrement the pin count for `handle`'s page. Never goes below zero;
    /// idempotent (returns `Ok`) if the page is not resident.
    pub fn unpin_page(&mut self, handle: &PageHandle) -> DbResult<()> {
        if let Some(&idx) = self.page_table.get(&handle.page_num)
            && self.frames[idx].fix_count > 0
        {
            self.frames[idx].fix_count -= 1;
        }
        Ok(())
    }

    /// Mark the frame holding `handle`'s page dirty.
    pub fn mark_dirty(&mut self, handle: &PageHandle) -> DbResult<()> {
        let idx = self.resident_frame(handle)?;
        self.frames[idx].dirty = true;
        Ok(())
    }

    /// Write the frame back immediately regardless of pin count, and clear
    /// its dirty flag.
    pub fn force_page(&mut self, handle: &PageHandle) -> DbResult<()> {
        let idx = self.resident_frame(handle)?;
        self.file.ensure_capacity(handle.page_num + 1)?;
        self.file.write_block(handle.page_num, &*self.frames[idx].data)?;
        self.num_write_io += 1;
        self.frames[idx].dirty = false;
        Ok(())
    }

    /// Write back every unpinned, dirty frame.
    pub fn force_flush_pool(&mut self) -> DbResult<()> {
        for idx in 0..self.frames.len() {
            if self.frames[idx].fix_count == 0 && self.frames[idx].dirty {
                let page_num = self.frames[idx]
                    .page_num
                    .expect("dirty frame must be occupied");
                self.file.ensure_capacity(page_num + 1)?;
                self.file.write_block(page_num, &*self.frames[idx].data)?;
                self.num_write_io += 1;
                self.frames[idx].dirty = false;
            }
        }
        Ok(())
    }

    /// Flush all eligible dirty frames and release the underlying file.
    /// Fails with `BufferPoolInUse` if any frame is still pinned.
    pub fn shutdown(mut self) -> DbResult<()> {
        let pinned: u32 = self.frames.iter().map(|f| f.fix_count).sum();
        if pinned > 0 {
            return Err(DbError::BufferPoolInUse(pinned));
        }
        self.force_flush_pool()?;
        self.file.close()
    }

    fn resident_frame(&self, handle: &PageHandle) -> DbResult<usize> {
        self.page_table
            .get(&handle.page_num)
            .copied()
            .ok_or_else(|| DbError::GeneralError(format!("page {} is not resident", handle.page_num)))
    }

    /// Borrow the bytes of the frame holding `handle`'s page.
    pub fn frame_data(&self, handle: &PageHandle) -> DbResult<&[u8; PAGE_SIZE]> {
        let idx = self.resident_frame(handle)?;
        Ok(&self.frames[idx].data)
    }

    /// Mutably borrow the bytes of the frame holding `handle`'s page.
    pub fn frame_data_mut(&mut self, handle: &PageHandle) -> DbResult<&mut [u8; PAGE_SIZE]> {
        let idx = self.resident_frame(handle)?;
        Ok(&mut self.frames[idx].data)
    }

    /// The page number resident in each frame, `None` where empty.
    pub fn get_frame_contents(&self) -> Vec<Option<u64>> {
        self.frames.iter().map(|f| f.page_num).collect()
    }

    pub fn get_dirty_flags(&self) -> Vec<bool> {
        self.frames.iter().map(|f| f.dirty).collect()
    }

    pub fn get_fix_counts(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.fix_count).collect()
    }

    pub fn get_num_read_io(&self) -> u64 {
        self.num_read_io
    }

    pub fn get_num_write_io(&self) -> u64 {
        self.num_write_io
    }

    /// Render the current frame contents as a human-readable table, for
    /// debugging.
    pub fn render_pool_contents(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| {
                vec![
                    i.to_string(),
                    f.page_num.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                    f.dirty.to_string(),
                    f.fix_count.to_string(),
                ]
            })
            .collect();
        common::pretty::render_string_table(
            &["frame", "page", "dirty", "fix_count"],
            rows,
            common::pretty::TableStyleKind::Modern,
        )
    }
}
