use rand::Rng;

/// No 0/o, 1/l: ids get read aloud and typed by hand
const ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";
pub const GAME_ID_LEN: usize = 6;

fn random_id(rng: &mut impl Rng) -> String {
    (0..GAME_ID_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Short game id that `taken` reports as free. Game ids double as room ids.
pub fn new_game_id(taken: impl Fn(&str) -> bool) -> String {
    let mut rng = rand::rng();
    loop {
        let id = random_id(&mut rng);
        if !taken(&id) {
            return id;
        }
    }
}
