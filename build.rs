// Copyright 2023 Remi Bernotavicius

fn main() {
    // The migrations are embedded by `embed_migrations!()`, rebuild when they change.
    println!("cargo:rerun-if-changed=migrations/");
}
