//! Net position per feed with two-phase fill decomposition.

use serde::{Deserialize, Serialize};

/// Signed holding and its volume-weighted entry price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Signed size; positive is long, zero is flat.
    pub size: f64,
    /// Average entry price of the open size; 0.0 when flat.
    pub price: f64,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.size == 0.0
    }

    /// Apply a signed fill and split it into the portion that opened new
    /// exposure and the portion that closed existing exposure.
    ///
    /// Both returned parts carry the sign of the incoming fill and always sum
    /// to it. Extending keeps a volume-weighted entry price; reducing leaves
    /// the entry price untouched; crossing through zero re-opens at the fill
    /// price.
    pub fn update(&mut self, size: f64, price: f64) -> (f64, f64) {
        let oldsize = self.size;
        self.size += size;

        if self.size == 0.0 {
            // Whole incoming fill (if any) went to closing.
            self.price = 0.0;
            (0.0, size)
        } else if oldsize == 0.0 {
            self.price = price;
            (size, 0.0)
        } else if oldsize > 0.0 {
            if size > 0.0 {
                self.price = (self.price * oldsize + price * size) / self.size;
                (size, 0.0)
            } else if self.size > 0.0 {
                (0.0, size)
            } else {
                // Long flipped short: old exposure closed, remainder opened.
                self.price = price;
                (self.size, -oldsize)
            }
        } else if size < 0.0 {
            self.price = (self.price * oldsize + price * size) / self.size;
            (size, 0.0)
        } else if self.size < 0.0 {
            (0.0, size)
        } else {
            self.price = price;
            (self.size, -oldsize)
        }
    }
}
