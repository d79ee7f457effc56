mod user;
mod user_mem;

pub use user::UserRepo;
pub use user_mem::MemoryUserRepository;
