//! Connect Four against a fluid tree agent
//!
//! The agent keeps one tree for the whole game. Every position it meets gets
//! a node; its children are the legal columns. Each simulation descends the
//! tree, finishes the game with random moves and erodes the path with the
//! outcome from the agent's point of view.
//!
//! Nodes have a single parent, so a position reached by two move orders
//! (a transposition) stays under the node that first reached it. The second
//! parent gets no child for that column and never searches it. When the
//! best child cannot be mapped back to a column, the agent says so and plays
//! the first legal column.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

use fluxzero::{FluidTree, NodeId, StateIndex};
use rand::seq::SliceRandom;

const ROWS: usize = 6;
const COLS: usize = 7;
const SIMULATIONS: usize = 2_000;

fn main() {
    // Initialize logging
    env_logger::init();

    println!("FluxZero Connect Four");
    println!("=====================");
    println!();

    let mut game = ConnectFour::new();
    let mut agent = FluxAgent::new();

    // Main game loop
    while !game.is_terminal() {
        println!("{}", game);

        if game.current_player == Player::Human {
            println!("Your move (enter column 0-6): ");
            io::stdout().flush().unwrap();

            let mut input = String::new();
            io::stdin().read_line(&mut input).unwrap();

            let column = match input.trim().parse::<usize>() {
                Ok(col) if col < COLS => col,
                _ => {
                    println!("Invalid column! Please enter a number between 0 and 6.");
                    continue;
                }
            };

            if !game.is_legal_move(column) {
                println!("Column {} is full! Choose another column.", column);
                continue;
            }

            game = game.play(column);
        } else {
            println!("Agent is thinking...");
            match agent.choose(&game, SIMULATIONS) {
                Some(column) => {
                    println!("Agent chooses column: {}", column);
                    game = game.play(column);
                    println!("{}", agent.tree.statistics().summary());
                }
                None => break,
            }
        }
    }

    println!("{}", game);

    match game.get_winner() {
        Some(Player::Human) => println!("You win!"),
        Some(Player::Agent) => println!("Agent wins!"),
        None => println!("The game is a draw!"),
    }
}

/// Search state: one tree plus the position behind every node
struct FluxAgent {
    tree: FluidTree,
    positions: StateIndex<ConnectFour>,
    boards: HashMap<NodeId, ConnectFour>,
}

impl FluxAgent {
    fn new() -> Self {
        FluxAgent {
            tree: FluidTree::new(),
            positions: StateIndex::new(),
            boards: HashMap::new(),
        }
    }

    /// Node for `game`, as a fresh root if the position was never reached
    fn node_for(&mut self, game: &ConnectFour) -> NodeId {
        if let Some(id) = self.positions.get(game) {
            return id;
        }
        let id = self.tree.create_node(NodeId::NONE).unwrap();
        self.positions.insert(game.clone(), id);
        self.boards.insert(id, game.clone());
        id
    }

    /// Links one child per legal column; a no-op for expanded nodes
    fn expand(&mut self, node: NodeId, game: &ConnectFour) {
        if !self.tree.get_children(node).is_empty() || game.is_terminal() {
            return;
        }
        for column in game.legal_moves() {
            let next = game.play(column);
            // Transpositions keep the node they were first reached through
            if !self.positions.contains(&next) {
                let id = self
                    .positions
                    .get_or_create(&mut self.tree, node, next.clone())
                    .unwrap();
                self.boards.insert(id, next);
            }
        }
    }

    fn choose(&mut self, game: &ConnectFour, simulations: usize) -> Option<usize> {
        let root = self.node_for(game);
        self.expand(root, game);
        let me = game.current_player;

        for _ in 0..simulations {
            let leaf = self.tree.select_leaf(root, 1.414);
            let Some(position) = self.boards.get(&leaf).cloned() else {
                break;
            };
            self.expand(leaf, &position);

            let reward = position.rollout().result_for(me);
            self.tree.backprop(leaf, reward, 0.1);
        }

        let best = self.tree.get_best_child(root);
        let column = game
            .legal_moves()
            .into_iter()
            .find(|&column| self.positions.get(&game.play(column)) == Some(best));
        if column.is_none() {
            println!("No searched move maps to a column, playing the first legal one");
        }
        column.or_else(|| game.legal_moves().first().copied())
    }
}

/// Players in Connect Four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Player {
    Human,
    Agent,
}

/// Connect Four game state
#[derive(Clone, PartialEq, Eq, Hash)]
struct ConnectFour {
    /// Board representation (None = empty, Some(Player) = occupied)
    board: [[Option<Player>; COLS]; ROWS],

    /// Current player's turn
    current_player: Player,
}

impl ConnectFour {
    /// Creates a new empty Connect Four board
    fn new() -> Self {
        ConnectFour {
            board: [[None; COLS]; ROWS],
            current_player: Player::Human,
        }
    }

    fn is_legal_move(&self, column: usize) -> bool {
        column < COLS && self.board[0][column].is_none()
    }

    fn legal_moves(&self) -> Vec<usize> {
        (0..COLS).filter(|&c| self.is_legal_move(c)).collect()
    }

    fn play(&self, column: usize) -> Self {
        let mut next = self.clone();
        if let Some(row) = (0..ROWS).rev().find(|&r| self.board[r][column].is_none()) {
            next.board[row][column] = Some(self.current_player);
            next.current_player = match self.current_player {
                Player::Human => Player::Agent,
                Player::Agent => Player::Human,
            };
        }
        next
    }

    /// Plays random moves until the game ends
    fn rollout(&self) -> Self {
        let mut rng = rand::thread_rng();
        let mut game = self.clone();
        while !game.is_terminal() {
            let moves = game.legal_moves();
            match moves.choose(&mut rng) {
                Some(&column) => game = game.play(column),
                None => break,
            }
        }
        game
    }

    fn result_for(&self, player: Player) -> f64 {
        match self.get_winner() {
            Some(winner) if winner == player => 1.0,
            Some(_) => 0.0,
            None => 0.5,
        }
    }

    fn get_winner(&self) -> Option<Player> {
        const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

        for row in 0..ROWS as isize {
            for col in 0..COLS as isize {
                let Some(player) = self.board[row as usize][col as usize] else {
                    continue;
                };
                for (dr, dc) in DIRECTIONS {
                    let four = (1..4).all(|k| {
                        let (r, c) = (row + dr * k, col + dc * k);
                        (0..ROWS as isize).contains(&r)
                            && (0..COLS as isize).contains(&c)
                            && self.board[r as usize][c as usize] == Some(player)
                    });
                    if four {
                        return Some(player);
                    }
                }
            }
        }
        None
    }

    fn is_terminal(&self) -> bool {
        self.get_winner().is_some() || self.legal_moves().is_empty()
    }
}

impl fmt::Display for ConnectFour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " ")?;
        for col in 0..COLS {
            write!(f, " {}", col)?;
        }
        writeln!(f)?;

        for row in 0..ROWS {
            write!(f, "|")?;
            for col in 0..COLS {
                let symbol = match self.board[row][col] {
                    Some(Player::Human) => "X",
                    Some(Player::Agent) => "O",
                    None => " ",
                };
                write!(f, "{}|", symbol)?;
            }
            writeln!(f)?;
        }

        write!(f, "+")?;
        for _ in 0..COLS {
            write!(f, "-+")?;
        }
        writeln!(f)?;

        writeln!(f, "\nPlayer {:?}'s turn", self.current_player)?;
        Ok(())
    }
}
