//! Coordinates and horizontal orientation.
//!
//! Axis convention follows Minecraft: north is -Z, east is +X, and a
//! clockwise turn is the one you see looking down from the sky.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Blocks per chunk edge.
pub const CHUNK_SIZE: i32 = 16;

/// Absolute block coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const ORIGIN: BlockPos = BlockPos { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x.div_euclid(CHUNK_SIZE), self.z.div_euclid(CHUNK_SIZE))
    }

    /// Component-wise minimum, used to grow bounding boxes.
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// True if this position lies inside the inclusive box `min..=max`.
    pub fn within(self, min: Self, max: Self) -> bool {
        (min.x..=max.x).contains(&self.x)
            && (min.y..=max.y).contains(&self.y)
            && (min.z..=max.z).contains(&self.z)
    }
}

impl Add for BlockPos {
    type Output = BlockPos;

    fn add(self, rhs: BlockPos) -> BlockPos {
        self.offset(rhs.x, rhs.y, rhs.z)
    }
}

impl Sub for BlockPos {
    type Output = BlockPos;

    fn sub(self, rhs: BlockPos) -> BlockPos {
        self.offset(-rhs.x, -rhs.y, -rhs.z)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk column coordinate (16x16 blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn min_block_x(self) -> i32 {
        self.x * CHUNK_SIZE
    }

    pub fn min_block_z(self) -> i32 {
        self.z * CHUNK_SIZE
    }

    /// Column in the middle of the chunk; structure sites are probed here.
    pub fn center_column(self) -> (i32, i32) {
        (self.min_block_x() + CHUNK_SIZE / 2, self.min_block_z() + CHUNK_SIZE / 2)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Horizontal facing of signs, chests and other directional blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    North,
    East,
    South,
    West,
}

impl Facing {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "north" => Some(Self::North),
            "east" => Some(Self::East),
            "south" => Some(Self::South),
            "west" => Some(Self::West),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }

    /// Unit step in this direction.
    pub fn step(self) -> BlockPos {
        match self {
            Self::North => BlockPos::new(0, 0, -1),
            Self::East => BlockPos::new(1, 0, 0),
            Self::South => BlockPos::new(0, 0, 1),
            Self::West => BlockPos::new(-1, 0, 0),
        }
    }

    fn quarter_turns(self) -> u8 {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Self::North,
            1 => Self::East,
            2 => Self::South,
            _ => Self::West,
        }
    }

    /// Standing signs store a 0..16 rotation; snap it to the nearest side.
    pub fn from_sign_rotation(rotation: u8) -> Self {
        // 0 = south, 4 = west, 8 = north, 12 = east
        match ((rotation as u16 + 2) % 16) / 4 {
            0 => Self::South,
            1 => Self::West,
            2 => Self::North,
            _ => Self::East,
        }
    }
}

/// Yaw rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    CounterClockwise90,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::None,
        Rotation::Clockwise90,
        Rotation::Clockwise180,
        Rotation::CounterClockwise90,
    ];

    /// Accepts any multiple of 90, negative values included.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(Self::from_quarter_turns(degrees.div_euclid(90).rem_euclid(4) as u8))
    }

    /// Rotation that turns north into `facing`.
    pub fn from_facing(facing: Facing) -> Self {
        Self::from_quarter_turns(facing.quarter_turns())
    }

    pub fn degrees(self) -> i32 {
        self.quarter_turns() as i32 * 90
    }

    fn quarter_turns(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Clockwise90 => 1,
            Self::Clockwise180 => 2,
            Self::CounterClockwise90 => 3,
        }
    }

    fn from_quarter_turns(turns: u8) -> Self {
        Self::ALL[(turns % 4) as usize]
    }

    /// Rotate a relative offset around the Y axis through the origin.
    pub fn apply(self, p: BlockPos) -> BlockPos {
        match self {
            Self::None => p,
            Self::Clockwise90 => BlockPos::new(-p.z, p.y, p.x),
            Self::Clockwise180 => BlockPos::new(-p.x, p.y, -p.z),
            Self::CounterClockwise90 => BlockPos::new(p.z, p.y, -p.x),
        }
    }

    pub fn apply_facing(self, facing: Facing) -> Facing {
        Facing::from_quarter_turns(facing.quarter_turns() + self.quarter_turns())
    }
}
