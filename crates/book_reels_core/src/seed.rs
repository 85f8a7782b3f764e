//! crates/book_reels_core/src/seed.rs
//!
//! The built-in passages every feed starts with.

use crate::domain::{Passage, PassageId};

const SEED: [(i64, &str, &str, &str, &str, &str); 8] = [
    (
        1,
        "It is a truth universally acknowledged...",
        "Pride and Prejudice",
        "Jane Austen",
        "Classic Romance",
        "from-rose-900 to-pink-900",
    ),
    (
        2,
        "All happy families are alike...",
        "Anna Karenina",
        "Leo Tolstoy",
        "Literary Fiction",
        "from-slate-800 to-slate-900",
    ),
    (
        3,
        "The man in black fled across the desert...",
        "The Gunslinger",
        "Stephen King",
        "Dark Fantasy",
        "from-orange-900 to-amber-950",
    ),
    (
        4,
        "It was a pleasure to burn...",
        "Fahrenheit 451",
        "Ray Bradbury",
        "Dystopian Fiction",
        "from-red-900 to-orange-950",
    ),
    (
        5,
        "If you really want to hear about it...",
        "The Catcher in the Rye",
        "J.D. Salinger",
        "Coming of Age",
        "from-blue-900 to-indigo-900",
    ),
    (
        6,
        "In my younger and more vulnerable years...",
        "The Great Gatsby",
        "F. Scott Fitzgerald",
        "American Classic",
        "from-emerald-900 to-teal-900",
    ),
    (
        7,
        "The sky above the port was the color of television...",
        "Neuromancer",
        "William Gibson",
        "Cyberpunk",
        "from-purple-900 to-violet-950",
    ),
    (
        8,
        "I write this sitting in the kitchen sink...",
        "I Capture the Castle",
        "Dodie Smith",
        "Literary Fiction",
        "from-cyan-900 to-blue-950",
    ),
];

/// Returns a fresh copy of the built-in passages, in feed order.
pub fn seed_passages() -> Vec<Passage> {
    SEED.iter()
        .map(|(id, text, book, author, genre, color)| Passage {
            id: PassageId::Number(*id),
            text: text.to_string(),
            book: book.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            color: color.to_string(),
        })
        .collect()
}
