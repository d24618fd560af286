// Pure game rules. Nothing in here touches shared state, clocks or I/O.

pub mod board;
pub mod pool;
pub mod selector;
pub mod tally;
pub mod win;

pub use board::{generate_board, labels_required, Board, Square};
pub use pool::{CategoryPool, BEAT_GENRES};
pub use selector::{select_next, Selection};
pub use tally::{tally, RoundTally, WeightRange};
pub use win::{has_win, winning_line, Line};
