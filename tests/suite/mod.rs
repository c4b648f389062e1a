mod activation;
mod assets;
mod commands;
