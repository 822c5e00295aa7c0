/// Identifier of the structure that owns a voxel. `0` means unowned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const EMPTY: EntityId = EntityId(0);

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for EntityId {
    #[inline]
    fn from(v: u32) -> Self {
        EntityId(v)
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Voxel {
    pub entity: EntityId,
}

impl Voxel {
    pub const EMPTY: Voxel = Voxel {
        entity: EntityId::EMPTY,
    };

    #[inline]
    pub fn is_empty(self) -> bool {
        self.entity.is_empty()
    }
}

/// Integer cell coordinate inside a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl GridIndex {
    #[inline]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

/// Half-open index box `[x0,x1) × [y0,y1) × [z0,z1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridRange {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
    pub z0: usize,
    pub z1: usize,
}

impl GridRange {
    #[inline]
    pub const fn new(x0: usize, x1: usize, y0: usize, y1: usize, z0: usize, z1: usize) -> Self {
        Self {
            x0,
            x1,
            y0,
            y1,
            z0,
            z1,
        }
    }

    /// The whole of an `sx × sy × sz` grid.
    #[inline]
    pub const fn full(sx: usize, sy: usize, sz: usize) -> Self {
        Self::new(0, sx, 0, sy, 0, sz)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1 || self.z0 >= self.z1
    }

    /// Number of cells covered.
    #[inline]
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.x1 - self.x0) * (self.y1 - self.y0) * (self.z1 - self.z0)
    }

    #[inline]
    pub fn contains(&self, i: GridIndex) -> bool {
        i.x >= self.x0
            && i.x < self.x1
            && i.y >= self.y0
            && i.y < self.y1
            && i.z >= self.z0
            && i.z < self.z1
    }

    pub fn intersect(&self, other: &GridRange) -> GridRange {
        GridRange::new(
            self.x0.max(other.x0),
            self.x1.min(other.x1),
            self.y0.max(other.y0),
            self.y1.min(other.y1),
            self.z0.max(other.z0),
            self.z1.min(other.z1),
        )
    }

    /// Visits every index, x fastest, then z, then y (the grid's storage order).
    pub fn iter(&self) -> impl Iterator<Item = GridIndex> + '_ {
        let r = *self;
        let (ys, zs, xs) = if r.is_empty() {
            (0..0, 0..0, 0..0)
        } else {
            (r.y0..r.y1, r.z0..r.z1, r.x0..r.x1)
        };
        ys.flat_map(move |y| {
            let xs = xs.clone();
            zs.clone()
                .flat_map(move |z| xs.clone().map(move |x| GridIndex::new(x, y, z)))
        })
    }
}
