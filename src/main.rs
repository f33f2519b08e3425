use grid_2048::engine::{Board, GameConfig};
use grid_2048::policy::Greedy;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let policy = Greedy::new();
    let mut rng = rand::thread_rng();
    let mut board = Board::new_game(GameConfig::default(), &mut rng);
    println!("{}", board);
    let mut move_count = 0;
    let mut merges = 0;
    while !board.is_over() {
        let Some(direction) = policy.best_move(&board) else { break };
        move_count += 1;
        board.make_move(direction, &mut rng);
        merges += board
            .movements_since_last_move()
            .iter()
            .filter(|m| board.is_tile_merged(m.tile_id))
            .count();
        board.complete_move();
        println!("{}", board);
    }
    println!(
        "Moves made: {}, Merges: {}, Points: {}, Highest tile: {}, Won: {}",
        move_count,
        merges,
        board.points(),
        board.highest_tile(),
        board.is_game_won()
    );
}
