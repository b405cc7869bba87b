pub mod pagination_dto;
pub mod user_dto;
