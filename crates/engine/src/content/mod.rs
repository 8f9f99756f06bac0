mod compiler;
mod database;

pub use compiler::{compile_content, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{
    ChestDef, ContentDatabase, DigitCodeDef, DoorDef, ExitDef, ItemDef, LevelDef, MechanicDef,
    NpcDef, PickupDef, PuzzleDef, SymbolLockDef,
};
